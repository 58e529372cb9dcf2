//! Transcript store
//!
//! The ordered, append-only history of blocks for one session.

mod error;
mod store;

pub use error::TranscriptStateError;
pub use store::{Transcript, TranscriptStore, TranscriptView};
