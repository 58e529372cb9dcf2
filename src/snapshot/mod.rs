//! Snapshot documents: versioned, portable freezes of a transcript.
//!
//! A document is plain JSON. It is written once (atomically) and read-only
//! afterwards, so any number of replays may decode the same file.

pub mod codec;
pub mod file;
mod legacy;
pub mod scrub;

pub use codec::{
    decode, encode, encode_with, DecodeError, EncodeOptions, SnapshotBlock, SnapshotDocument,
    SnapshotMode, SNAPSHOT_SCHEMA_VERSION,
};
pub use file::{read_snapshot, write_snapshot, SnapshotIoError};
pub use scrub::ScrubConfig;
