//! Mock dispatcher for deterministic testing
//!
//! Answers commands from a script instead of contacting a backend, and
//! records every call so tests can verify what was executed and in which
//! order.
//!
//! # Example
//! ```no_run
//! use rewind::block::BlockResult;
//! use rewind::dispatch::mock::MockDispatcher;
//! use rewind::dispatch::Execution;
//!
//! let backend = MockDispatcher::new()
//!     .respond("kubectl get pods", Execution::success(BlockResult::text("nginx")))
//!     .respond("kubectl create -f pod.yaml", Execution::failure(Some(409), "already exists"));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::runner::{CommandDispatcher, DispatchError, Execution};

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Scripted dispatcher for tests
#[derive(Clone, Default)]
pub struct MockDispatcher {
    /// Queued answers per command; the last answer repeats once the queue drains
    script: Arc<Mutex<HashMap<String, VecDeque<Result<Execution, DispatchError>>>>>,
    /// Every command executed, in call order
    calls: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    hook: Option<Hook>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful or failed backend answer for `command`
    pub fn respond(self, command: impl Into<String>, execution: Execution) -> Self {
        self.push(command.into(), Ok(execution));
        self
    }

    /// Queue a transport failure for `command`
    pub fn respond_err(self, command: impl Into<String>, error: DispatchError) -> Self {
        self.push(command.into(), Err(error));
        self
    }

    /// Simulated backend latency per call (default: Duration::ZERO)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `hook` with the command text at the start of every call
    pub fn with_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    fn push(&self, command: String, answer: Result<Execution, DispatchError>) {
        self.script.lock().entry(command).or_default().push_back(answer);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of commands that were ever executing at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_answer(&self, command: &str) -> Result<Execution, DispatchError> {
        let mut script = self.script.lock();
        let Some(queue) = script.get_mut(command) else {
            return Err(DispatchError::Unavailable(format!(
                "no scripted response for {:?}",
                command
            )));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| unscripted(command))
        } else {
            queue.front().cloned().unwrap_or_else(|| unscripted(command))
        }
    }
}

fn unscripted(command: &str) -> Result<Execution, DispatchError> {
    Err(DispatchError::Unavailable(format!(
        "no scripted response for {:?}",
        command
    )))
}

/// Holds one in-flight slot until dropped, including when the call is abandoned
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, high_water: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandDispatcher for MockDispatcher {
    async fn execute(&self, command: &str) -> Result<Execution, DispatchError> {
        let _slot = InFlight::enter(&self.in_flight, &self.max_in_flight);

        if let Some(hook) = &self.hook {
            hook(command);
        }
        self.calls.lock().push(command.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.next_answer(command)
    }
}
