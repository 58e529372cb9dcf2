//! Command dispatch: the one capability replay needs from its environment.

pub mod mock;
pub mod process;
pub mod runner;

pub use mock::MockDispatcher;
pub use process::{status_code_from_message, ProcessDispatcher};
pub use runner::{CommandDispatcher, DispatchError, Execution};
