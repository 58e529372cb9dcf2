//! Version 1 snapshot documents.
//!
//! v1 predates per-block indices and detail references, and recorded the
//! replay mode as a boolean `exec` flag. Blocks are migrated in order.

use serde::Deserialize;
use serde_json::Value;

use crate::block::{BlockResult, BlockStatus};

use super::codec::{DecodeError, SnapshotBlock, SnapshotDocument, SnapshotMode, SNAPSHOT_SCHEMA_VERSION};

#[derive(Debug, Deserialize)]
struct LegacyDocumentV1 {
    #[serde(default)]
    exec: bool,
    blocks: Vec<LegacyBlockV1>,
}

#[derive(Debug, Deserialize)]
struct LegacyBlockV1 {
    command: String,
    status: BlockStatus,
    result: BlockResult,
}

pub(super) fn migrate_v1(value: Value) -> Result<SnapshotDocument, DecodeError> {
    let legacy: LegacyDocumentV1 = serde_json::from_value(value)
        .map_err(|e| DecodeError::Corrupt(format!("v1 document: {e}")))?;

    let mode = SnapshotMode::from_exec_flag(legacy.exec);
    let blocks = legacy
        .blocks
        .into_iter()
        .enumerate()
        .map(|(index, block)| SnapshotBlock {
            index,
            command: block.command,
            status: block.status,
            result: block.result,
            detail_ref: None,
            reexecutable: mode.is_reexec(),
            start_time: None,
            completion_time: None,
        })
        .collect();

    tracing::debug!(mode = %mode, "Migrated v1 snapshot document");

    Ok(SnapshotDocument {
        version: SNAPSHOT_SCHEMA_VERSION,
        mode,
        blocks,
    })
}
