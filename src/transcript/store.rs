use std::ops::{Bound, RangeBounds};

use chrono::Utc;
use uuid::Uuid;

use crate::block::{Block, BlockResult, BlockStatus, DetailRef};

use super::TranscriptStateError;

/// An ordered sequence of blocks with contiguous 0-based indices
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    blocks: Vec<Block>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transcript from blocks that must already be indexed `0..n`
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, TranscriptStateError> {
        for (position, block) in blocks.iter().enumerate() {
            if block.index != position {
                return Err(TranscriptStateError::InvalidState(format!(
                    "block at position {} has index {}",
                    position, block.index
                )));
            }
        }
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn view(&self) -> TranscriptView<'_> {
        TranscriptView {
            blocks: &self.blocks,
        }
    }

    /// Read-only ordered view over `range` (clamped to the transcript)
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> TranscriptView<'_> {
        let len = self.blocks.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);
        TranscriptView {
            blocks: &self.blocks[start..end],
        }
    }

    /// Append a block that is already terminal. Used by replay, which never
    /// exposes a block before its rendered outcome is known.
    pub(crate) fn push_rendered(&mut self, mut block: Block) -> Result<&Block, TranscriptStateError> {
        if block.is_pending() || block.result.is_none() {
            return Err(TranscriptStateError::InvalidState(format!(
                "block {} is not terminal",
                block.index
            )));
        }
        block.index = self.blocks.len();
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Structural equality over all blocks, timestamps ignored
    pub fn same_structure(&self, other: &Transcript) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(&other.blocks)
                .all(|(a, b)| a.same_structure(b))
    }
}

/// Borrowed, read-only run of blocks from a transcript
#[derive(Debug, Clone, Copy)]
pub struct TranscriptView<'a> {
    blocks: &'a [Block],
}

impl<'a> TranscriptView<'a> {
    pub fn blocks(&self) -> &'a [Block] {
        self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl<'a> IntoIterator for TranscriptView<'a> {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// The live transcript of one session.
///
/// Owned by exactly one session and passed explicitly; replay never writes to
/// it, it builds its own [`Transcript`] instead.
#[derive(Debug)]
pub struct TranscriptStore {
    session_id: Uuid,
    transcript: Transcript,
    replaying: bool,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::with_session_id(Uuid::new_v4())
    }

    pub fn with_session_id(session_id: Uuid) -> Self {
        Self {
            session_id,
            transcript: Transcript::new(),
            replaying: false,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.transcript.get(index)
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Mark the session as mid-replay; appends fail until [`Self::end_replay`]
    pub fn begin_replay(&mut self) -> Result<(), TranscriptStateError> {
        if self.replaying {
            return Err(TranscriptStateError::InvalidState(
                "a replay is already in progress".to_string(),
            ));
        }
        self.replaying = true;
        Ok(())
    }

    pub fn end_replay(&mut self) {
        self.replaying = false;
    }

    /// Create a new pending block at the next index
    pub fn append(&mut self, command: impl Into<String>) -> Result<&Block, TranscriptStateError> {
        if self.replaying {
            return Err(TranscriptStateError::InvalidState(
                "cannot append while a replay is being reconstructed".to_string(),
            ));
        }
        if let Some(last) = self.transcript.blocks.last() {
            if last.is_pending() {
                return Err(TranscriptStateError::InvalidState(format!(
                    "block {} is still pending",
                    last.index
                )));
            }
        }

        let index = self.transcript.blocks.len();
        let block = Block::pending(index, command, Utc::now());
        tracing::debug!(
            session_id = %self.session_id,
            index,
            command = %block.command,
            "Appended block"
        );
        self.transcript.blocks.push(block);
        Ok(&self.transcript.blocks[index])
    }

    /// Move the addressed block to its terminal state
    pub fn finalize(
        &mut self,
        index: usize,
        status: BlockStatus,
        result: BlockResult,
    ) -> Result<&Block, TranscriptStateError> {
        let block = self
            .transcript
            .blocks
            .get_mut(index)
            .ok_or(TranscriptStateError::NotFound(index))?;
        block.finalize(status, result, Utc::now())?;
        tracing::debug!(
            session_id = %self.session_id,
            index,
            status = %block.status,
            "Finalized block"
        );
        Ok(block)
    }

    /// Record the detail view opened from a finished block
    pub fn open_detail(
        &mut self,
        index: usize,
        detail_ref: DetailRef,
    ) -> Result<&Block, TranscriptStateError> {
        let block = self
            .transcript
            .blocks
            .get_mut(index)
            .ok_or(TranscriptStateError::NotFound(index))?;
        if block.is_pending() {
            return Err(TranscriptStateError::InvalidState(format!(
                "block {} is still pending",
                index
            )));
        }
        block.detail_ref = Some(detail_ref);
        Ok(block)
    }

    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> TranscriptView<'_> {
        self.transcript.slice(range)
    }

    pub fn view(&self) -> TranscriptView<'_> {
        self.transcript.view()
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}
