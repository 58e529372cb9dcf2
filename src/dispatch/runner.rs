use async_trait::async_trait;
use thiserror::Error;

use crate::block::{BlockResult, BlockStatus};

/// The command never produced a backend result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Failed to spawn command: {0}")]
    Spawn(String),
    #[error("Command timed out after {0}ms")]
    Timeout(u64),
    #[error("Dispatcher unavailable: {0}")]
    Unavailable(String),
}

/// What a backend answered for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub status: BlockStatus,
    pub result: BlockResult,
}

impl Execution {
    pub fn success(result: BlockResult) -> Self {
        Self {
            status: BlockStatus::Success,
            result,
        }
    }

    pub fn failure(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status: BlockStatus::Error,
            result: BlockResult::failure(status_code, message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BlockStatus::Success
    }

    /// Coerce into a terminal answer a block can be finalized with.
    ///
    /// A `pending` status, or a success carrying a failure payload, is
    /// reported as an error.
    pub fn settled(self) -> Self {
        match (self.status, self.result) {
            (BlockStatus::Pending, BlockResult::Failure { status_code, message }) => {
                Self::failure(status_code, message)
            }
            (BlockStatus::Pending, _) => {
                Self::failure(None, "dispatcher returned a non-terminal status")
            }
            (BlockStatus::Success, failure @ BlockResult::Failure { .. }) => Self {
                status: BlockStatus::Error,
                result: failure,
            },
            (status, result) => Self { status, result },
        }
    }
}

/// Executes command strings against some backend.
///
/// Live sessions and replay re-execution go through the same dispatcher.
/// Implementations may suspend on I/O; callers await one command at a time.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn execute(&self, command: &str) -> Result<Execution, DispatchError>;
}
