use thiserror::Error;

/// Usage errors on a transcript. These indicate a logic bug in the caller,
/// never a transient condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptStateError {
    #[error("Block not found: {0}")]
    NotFound(usize),
    #[error("Block already finalized: {0}")]
    AlreadyFinalized(usize),
    #[error("Invalid transcript state: {0}")]
    InvalidState(String),
}
