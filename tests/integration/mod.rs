//! Integration tests for rewind
//!
//! Record a session, freeze it, and replay it through the public API.

#[path = "../common/mod.rs"]
pub mod common;

pub mod replay_flow;
