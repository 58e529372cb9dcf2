use serde::Serialize;

use crate::block::{Block, BlockResult, BlockStatus, DetailRef};
use crate::snapshot::SnapshotMode;
use crate::transcript::Transcript;

use super::reconcile::{Outcome, Reconciliation};

/// Replay state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReplayPhase {
    Loading,
    Rebuilding,
    /// Block redrawn from the recording, nothing executed
    Idle { index: usize },
    /// Block command resubmitted, waiting for the backend
    Reexecuting { index: usize },
    Done,
}

/// Progress stream for the presentation layer
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    Phase(ReplayPhase),
    BlockRendered(RenderedBlock),
}

/// A rebuilt block with its final rendered state
#[derive(Debug, Clone, Serialize)]
pub struct RenderedBlock {
    pub block: Block,
    /// Recorded result, kept when the block was re-executed
    pub recorded: Option<BlockResult>,
    /// Present only for re-executed blocks
    pub reconciliation: Option<Reconciliation>,
    /// Detail view currently open; only ever set by user action, never by replay
    pub detail: Option<DetailRef>,
}

impl RenderedBlock {
    pub(crate) fn recorded(block: Block) -> Self {
        Self {
            block,
            recorded: None,
            reconciliation: None,
            detail: None,
        }
    }

    /// Block rendered with the live result of its re-execution
    pub(crate) fn reconciled(mut block: Block, reconciliation: Reconciliation) -> Self {
        let recorded = block.result.replace(reconciliation.result.clone());
        block.status = reconciliation.status;
        Self {
            block,
            recorded,
            reconciliation: Some(reconciliation),
            detail: None,
        }
    }

    pub fn index(&self) -> usize {
        self.block.index
    }

    pub fn command(&self) -> &str {
        &self.block.command
    }

    pub fn status(&self) -> BlockStatus {
        self.block.status
    }

    pub fn result(&self) -> Option<&BlockResult> {
        self.block.result.as_ref()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.reconciliation.as_ref().map(|r| r.outcome)
    }

    pub fn status_code(&self) -> Option<u16> {
        self.reconciliation
            .as_ref()
            .and_then(|r| r.status_code)
            .or_else(|| self.result().and_then(BlockResult::status_code))
    }

    pub fn was_reexecuted(&self) -> bool {
        self.reconciliation.is_some()
    }

    /// User action: open the detail view this block was linked to
    pub fn open_detail(&mut self) -> Option<&DetailRef> {
        self.detail = Some(self.block.detail_ref.clone()?);
        self.detail.as_ref()
    }

    /// User action: open the detail view of a table row
    pub fn open_row_detail(&mut self, row: &str) -> Option<DetailRef> {
        let detail = self.result()?.row(row)?.detail_ref.clone()?;
        self.detail = Some(detail.clone());
        Some(detail)
    }

    pub fn is_detail_open(&self) -> bool {
        self.detail.is_some()
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }
}

/// Everything a finished (or cancelled) replay hands to presentation
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub mode: SnapshotMode,
    pub blocks: Vec<RenderedBlock>,
    /// Freshly built transcript owned by this replay
    pub transcript: Transcript,
    /// Stopped early; blocks not reached are absent
    pub cancelled: bool,
    /// Blocks in the source document
    pub expected: usize,
}

impl ReplayReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.outcome() == Some(outcome))
            .count()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &RenderedBlock> {
        self.blocks
            .iter()
            .filter(|b| b.outcome() == Some(Outcome::Conflict))
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.blocks.len() == self.expected
    }
}
