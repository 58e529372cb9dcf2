use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::codec::{decode, DecodeError, SnapshotDocument};

#[derive(Error, Debug)]
pub enum SnapshotIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Failed to serialize snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Snapshot write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Persist a document atomically: a reader never sees a half-written file.
pub async fn write_snapshot(path: &Path, document: &SnapshotDocument) -> Result<(), SnapshotIoError> {
    let bytes = document.to_json_bytes()?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;
    Ok(())
}

/// Read and decode a snapshot file
pub async fn read_snapshot(path: &Path) -> Result<SnapshotDocument, SnapshotIoError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(decode(&bytes)?)
}

fn write_atomic(path: &PathBuf, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
