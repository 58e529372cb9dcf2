//! Block model.
//!
//! A block is one executed command plus everything needed to redraw it:
//! - the exact command text
//! - a terminal status
//! - a self-describing result payload
//! - an optional logical link to a detail view opened from it

pub mod model;

pub use model::{Block, BlockResult, BlockStatus, DetailRef, TableRow};
