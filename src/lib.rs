pub mod block;
pub mod config;
pub mod dispatch;
pub mod render;
pub mod replay;
pub mod session;
pub mod snapshot;
pub mod transcript;
pub mod util;

pub use block::{Block, BlockResult, BlockStatus, DetailRef, TableRow};
pub use config::Config;
pub use dispatch::{CommandDispatcher, DispatchError, Execution, MockDispatcher, ProcessDispatcher};
pub use replay::{
    FailureCause, Outcome, Reconciliation, ReconciliationPolicy, RenderedBlock, ReplayEngine,
    ReplayError, ReplayEvent, ReplayPhase, ReplayReport,
};
pub use session::{LineOutcome, Session, SessionError};
pub use snapshot::{decode, encode, DecodeError, SnapshotDocument, SnapshotMode};
pub use transcript::{Transcript, TranscriptStateError, TranscriptStore, TranscriptView};
