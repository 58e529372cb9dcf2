use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::block::{Block, BlockResult, BlockStatus, DetailRef};
use crate::transcript::{Transcript, TranscriptView};

use super::legacy;

/// Newest document schema this build understands.
///
/// History:
/// - 1: blocks carry `command`, `status`, `result`; mode is an `exec` flag
/// - 2: adds `index`, `detailRef`, per-block `reexecutable`, optional timing
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// Redraw recorded results only; nothing is re-run
    Static,
    /// Re-run every command on replay and reconcile
    Reexec,
}

impl SnapshotMode {
    pub fn from_exec_flag(exec: bool) -> Self {
        if exec {
            SnapshotMode::Reexec
        } else {
            SnapshotMode::Static
        }
    }

    pub fn is_reexec(&self) -> bool {
        matches!(self, SnapshotMode::Reexec)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotMode::Static => "static",
            SnapshotMode::Reexec => "reexec",
        }
    }
}

impl std::fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported snapshot schema version {found} (max supported: {supported})")]
    UnsupportedVersion { found: u64, supported: u32 },
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// A block as persisted in a snapshot document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBlock {
    pub index: usize,
    pub command: String,
    pub status: BlockStatus,
    pub result: BlockResult,
    pub detail_ref: Option<DetailRef>,
    pub reexecutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl SnapshotBlock {
    /// Rebuild a terminal block, status and result copied verbatim.
    ///
    /// Documents written without timing get `fallback` for both timestamps.
    pub fn to_block(&self, fallback: DateTime<Utc>) -> Block {
        let start = self.start_time.unwrap_or(fallback);
        let end = self.completion_time.unwrap_or(start);
        let mut block = Block::finished(
            self.index,
            self.command.clone(),
            self.status,
            self.result.clone(),
            start,
            end,
        );
        block.detail_ref = self.detail_ref.clone();
        block.reexecutable = self.reexecutable;
        block
    }
}

/// Persisted, versioned freeze of a transcript. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub version: u32,
    pub mode: SnapshotMode,
    pub blocks: Vec<SnapshotBlock>,
}

impl SnapshotDocument {
    /// Pretty JSON with a stable field order and a trailing newline
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Rebuild the frozen transcript without running anything
    pub fn to_transcript(&self) -> Result<Transcript, DecodeError> {
        validate(self)?;
        let now = Utc::now();
        let blocks = self.blocks.iter().map(|b| b.to_block(now)).collect();
        Transcript::from_blocks(blocks).map_err(|e| DecodeError::Corrupt(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Persist start/completion timestamps (informational only)
    pub include_timing: bool,
}

/// Freeze a transcript view. Total and deterministic.
pub fn encode(view: TranscriptView<'_>, mode: SnapshotMode) -> SnapshotDocument {
    encode_with(view, mode, EncodeOptions::default())
}

pub fn encode_with(
    view: TranscriptView<'_>,
    mode: SnapshotMode,
    options: EncodeOptions,
) -> SnapshotDocument {
    let reexecutable = mode.is_reexec();
    let blocks = view
        .iter()
        .filter_map(|block| {
            let Some(result) = block.result.clone().filter(|_| !block.is_pending()) else {
                tracing::debug!(index = block.index, "Skipping pending block in snapshot");
                return None;
            };
            Some((block, result))
        })
        .enumerate()
        .map(|(index, (block, result))| SnapshotBlock {
            index,
            command: block.command.clone(),
            status: block.status,
            result,
            detail_ref: block.detail_ref.clone(),
            reexecutable,
            start_time: options.include_timing.then_some(block.start_time),
            completion_time: block.completion_time.filter(|_| options.include_timing),
        })
        .collect();

    SnapshotDocument {
        version: SNAPSHOT_SCHEMA_VERSION,
        mode,
        blocks,
    }
}

/// Parse a snapshot document. Either every block parses or the call fails.
pub fn decode(bytes: &[u8]) -> Result<SnapshotDocument, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| DecodeError::Corrupt(format!("invalid JSON: {e}")))?;

    let version = value
        .get("version")
        .ok_or_else(|| DecodeError::Corrupt("missing version".to_string()))?
        .as_u64()
        .ok_or_else(|| DecodeError::Corrupt("version must be a non-negative integer".to_string()))?;

    if version > u64::from(SNAPSHOT_SCHEMA_VERSION) {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            supported: SNAPSHOT_SCHEMA_VERSION,
        });
    }

    let document = match version {
        // Pre-release documents omitted the version bump; treat them as v1.
        0 | 1 => legacy::migrate_v1(value)?,
        _ => serde_json::from_value::<SnapshotDocument>(value)
            .map_err(|e| DecodeError::Corrupt(e.to_string()))?,
    };

    validate(&document)?;
    Ok(document)
}

/// Check the invariants every decoded document holds
pub(crate) fn validate(document: &SnapshotDocument) -> Result<(), DecodeError> {
    if document.version > SNAPSHOT_SCHEMA_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: u64::from(document.version),
            supported: SNAPSHOT_SCHEMA_VERSION,
        });
    }
    for (position, block) in document.blocks.iter().enumerate() {
        if block.index != position {
            return Err(DecodeError::Corrupt(format!(
                "block at position {} has index {}",
                position, block.index
            )));
        }
        match (block.status, &block.result) {
            (BlockStatus::Pending, _) => {
                return Err(DecodeError::Corrupt(format!(
                    "block {} is pending",
                    block.index
                )));
            }
            (BlockStatus::Success, BlockResult::Failure { .. }) => {
                return Err(DecodeError::Corrupt(format!(
                    "block {} succeeded but carries a failure payload",
                    block.index
                )));
            }
            _ => {}
        }
        if let (Some(start), Some(end)) = (block.start_time, block.completion_time) {
            if end < start {
                return Err(DecodeError::Corrupt(format!(
                    "block {} completes before it starts",
                    block.index
                )));
            }
        }
    }
    Ok(())
}
