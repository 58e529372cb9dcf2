use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockResult, BlockStatus};
use crate::dispatch::{DispatchError, Execution};

/// How a live re-execution compares to what was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Matched,
    Diverged,
    Conflict,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Matched => "matched",
            Outcome::Diverged => "diverged",
            Outcome::Conflict => "conflict",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a live re-execution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The prior run already created what the command creates
    AlreadyExists,
    /// What the command acts on is gone
    NotFound,
    Forbidden,
    /// The command never reached the backend
    Transport,
    Other,
}

impl FailureCause {
    pub fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(409) => FailureCause::AlreadyExists,
            Some(404) => FailureCause::NotFound,
            Some(401) | Some(403) => FailureCause::Forbidden,
            _ => FailureCause::Other,
        }
    }
}

/// Per-block result of one replay pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub outcome: Outcome,
    /// Status the block is rendered with
    pub status: BlockStatus,
    /// Result the block is rendered with (always the live one)
    pub result: BlockResult,
    pub status_code: Option<u16>,
    pub message: Option<String>,
    pub cause: Option<FailureCause>,
}

impl Reconciliation {
    pub fn is_conflict(&self) -> bool {
        self.outcome == Outcome::Conflict
    }
}

/// Decides matched / diverged / conflict for re-executed blocks.
///
/// Any live failure is a conflict. A changed result from a successful run
/// (a new resource revision, different output) is divergence, never fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationPolicy {
    /// Compare text results with trailing whitespace trimmed
    pub trim_text: bool,
}

impl ReconciliationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trim_text(mut self, trim_text: bool) -> Self {
        self.trim_text = trim_text;
        self
    }

    pub fn reconcile(
        &self,
        recorded: &Block,
        live: Result<Execution, DispatchError>,
    ) -> Reconciliation {
        let execution = match live {
            Ok(execution) => execution.settled(),
            Err(err) => {
                let message = err.to_string();
                return Reconciliation {
                    outcome: Outcome::Conflict,
                    status: BlockStatus::Error,
                    result: BlockResult::failure(None, message.clone()),
                    status_code: None,
                    message: Some(message),
                    cause: Some(FailureCause::Transport),
                };
            }
        };

        if execution.is_success() {
            let same = self.same_result(recorded, &execution.result);
            let (outcome, message) = if same && recorded.status == BlockStatus::Success {
                (Outcome::Matched, None)
            } else if recorded.status == BlockStatus::Error {
                (
                    Outcome::Diverged,
                    Some("recorded failure no longer reproduces".to_string()),
                )
            } else {
                (
                    Outcome::Diverged,
                    Some("live result differs from the recorded one".to_string()),
                )
            };
            return Reconciliation {
                outcome,
                status: BlockStatus::Success,
                result: execution.result,
                status_code: None,
                message,
                cause: None,
            };
        }

        let result = into_failure(execution.result);
        let status_code = result.status_code();
        let message = match &result {
            BlockResult::Failure { message, .. } => Some(message.clone()),
            _ => None,
        };

        Reconciliation {
            outcome: Outcome::Conflict,
            status: BlockStatus::Error,
            result,
            status_code,
            message,
            cause: Some(FailureCause::from_status_code(status_code)),
        }
    }

    fn same_result(&self, recorded: &Block, live: &BlockResult) -> bool {
        if self.trim_text {
            if let (Some(BlockResult::Text { text: a }), BlockResult::Text { text: b }) =
                (&recorded.result, live)
            {
                return a.trim_end() == b.trim_end();
            }
        }
        recorded.reconciles_with(&recorded.command, live)
    }
}

fn into_failure(result: BlockResult) -> BlockResult {
    match result {
        failure @ BlockResult::Failure { .. } => failure,
        BlockResult::Text { text } => BlockResult::failure(None, text),
        other => BlockResult::failure(None, format!("{:?}", other)),
    }
}
