//! Replay: rebuild a transcript from a snapshot, optionally re-running its
//! commands and reconciling live results against the recorded ones.

pub mod engine;
pub mod events;
pub mod reconcile;

pub use engine::{ReplayEngine, ReplayError};
pub use events::{RenderedBlock, ReplayEvent, ReplayPhase, ReplayReport};
pub use reconcile::{FailureCause, Outcome, Reconciliation, ReconciliationPolicy};
