//! Deterministic session ids for reproducible transcripts

use std::sync::atomic::{AtomicU64, Ordering};

use rewind::TranscriptStore;
use uuid::Uuid;

/// Produces sequential UUIDs starting from 1
pub struct DeterministicUuidGenerator {
    counter: AtomicU64,
}

impl DeterministicUuidGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Uuid::from_u128(n as u128)
    }

    /// A fresh store whose session id comes from this generator
    pub fn store(&self) -> TranscriptStore {
        TranscriptStore::with_session_id(self.next())
    }
}

impl Default for DeterministicUuidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let gen = DeterministicUuidGenerator::new();
        assert_eq!(gen.next(), Uuid::from_u128(1));
        assert_eq!(gen.store().session_id(), Uuid::from_u128(2));
    }
}
