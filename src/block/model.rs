use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcript::TranscriptStateError;

/// Execution status of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Pending,
    Success,
    Error,
}

impl BlockStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BlockStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::Pending => "pending",
            BlockStatus::Success => "success",
            BlockStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical name of a detail view, e.g. `pod/nginx`.
///
/// This is a lookup key, never a handle into live session objects. Resolving
/// it is up to whoever presents the block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetailRef(String);

impl DetailRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Reference to a named resource of a given kind (`<kind>/<name>`)
    pub fn resource(kind: &str, name: &str) -> Self {
        Self(format!("{}/{}", kind.to_ascii_lowercase(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(kind, name)` if this is a `<kind>/<name>` reference
    pub fn kind_and_name(&self) -> Option<(&str, &str)> {
        self.0
            .split_once('/')
            .filter(|(kind, name)| !kind.is_empty() && !name.is_empty())
    }
}

impl std::fmt::Display for DetailRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of a structured table result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    /// Row identity (usually the NAME column)
    pub name: String,
    pub cells: Vec<String>,
    /// Detail view a click on this row opens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_ref: Option<DetailRef>,
}

impl TableRow {
    pub fn new(name: impl Into<String>, cells: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cells,
            detail_ref: None,
        }
    }

    pub fn with_detail(mut self, detail_ref: DetailRef) -> Self {
        self.detail_ref = Some(detail_ref);
        self
    }
}

/// Result payload of a finished block.
///
/// Serialized with an explicit `type` discriminant so every variant can be
/// redrawn from a snapshot without re-running the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockResult {
    Text {
        text: String,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<TableRow>,
    },
    Resource {
        kind: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
    /// Payload of an errored block
    #[serde(rename_all = "camelCase")]
    Failure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        message: String,
    },
}

impl BlockResult {
    pub fn text(text: impl Into<String>) -> Self {
        BlockResult::Text { text: text.into() }
    }

    pub fn failure(status_code: Option<u16>, message: impl Into<String>) -> Self {
        BlockResult::Failure {
            status_code,
            message: message.into(),
        }
    }

    pub fn resource(kind: impl Into<String>, name: impl Into<String>) -> Self {
        BlockResult::Resource {
            kind: kind.into(),
            name: name.into(),
            namespace: None,
            revision: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BlockResult::Failure { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            BlockResult::Failure { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Find a table row by name
    pub fn row(&self, name: &str) -> Option<&TableRow> {
        match self {
            BlockResult::Table { rows, .. } => rows.iter().find(|row| row.name == name),
            _ => None,
        }
    }
}

/// One historical command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: usize,
    pub command: String,
    pub start_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub status: BlockStatus,
    pub result: Option<BlockResult>,
    pub detail_ref: Option<DetailRef>,
    pub reexecutable: bool,
}

impl Block {
    pub(crate) fn pending(index: usize, command: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            index,
            command: command.into(),
            start_time: now,
            completion_time: None,
            status: BlockStatus::Pending,
            result: None,
            detail_ref: None,
            reexecutable: false,
        }
    }

    /// Build an already-terminal block (used when rebuilding from a snapshot)
    pub(crate) fn finished(
        index: usize,
        command: impl Into<String>,
        status: BlockStatus,
        result: BlockResult,
        start_time: DateTime<Utc>,
        completion_time: DateTime<Utc>,
    ) -> Self {
        Self {
            index,
            command: command.into(),
            start_time,
            completion_time: Some(completion_time.max(start_time)),
            status,
            result: Some(result),
            detail_ref: None,
            reexecutable: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BlockStatus::Pending
    }

    /// Transition `pending -> {success, error}`. Happens exactly once.
    pub(crate) fn finalize(
        &mut self,
        status: BlockStatus,
        result: BlockResult,
        now: DateTime<Utc>,
    ) -> Result<(), TranscriptStateError> {
        if !self.is_pending() {
            return Err(TranscriptStateError::AlreadyFinalized(self.index));
        }
        if !status.is_terminal() {
            return Err(TranscriptStateError::InvalidState(format!(
                "block {} cannot be finalized as pending",
                self.index
            )));
        }
        self.status = status;
        self.result = Some(result);
        self.completion_time = Some(now.max(self.start_time));
        Ok(())
    }

    /// Reconciliation equality: `{command, result}`, timestamps ignored
    pub fn reconciles_with(&self, command: &str, result: &BlockResult) -> bool {
        self.command == command && self.result.as_ref() == Some(result)
    }

    /// Structural equality over everything except timestamps
    pub fn same_structure(&self, other: &Block) -> bool {
        self.index == other.index
            && self.command == other.command
            && self.status == other.status
            && self.result == other.result
            && self.detail_ref == other.detail_ref
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completion_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}
