//! Recorded-session fixtures and a fake cluster backend

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use rewind::dispatch::status_code_from_message;
use rewind::{
    BlockResult, CommandDispatcher, Config, DetailRef, DispatchError, Execution, Session, TableRow,
};

/// Stateful stand-in for a cluster API.
///
/// Understands `create pod <name>`, `delete pod <name>` and `get pods`.
/// Every call is logged as `start:<cmd>` / `end:<cmd>`.
#[derive(Default)]
pub struct FakeCluster {
    pods: Mutex<BTreeSet<String>>,
    log: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(pods: &[&str]) -> Self {
        let cluster = Self::new();
        cluster
            .pods
            .lock()
            .extend(pods.iter().map(|p| p.to_string()));
        cluster
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn pods(&self) -> Vec<String> {
        self.pods.lock().iter().cloned().collect()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn apply(&self, command: &str) -> Result<Execution, DispatchError> {
        let words: Vec<&str> = command.split_whitespace().collect();
        let mut pods = self.pods.lock();
        match words.as_slice() {
            ["create", "pod", name] => {
                if !pods.insert(name.to_string()) {
                    return Ok(server_error(format!(
                        "Error from server (AlreadyExists): pods \"{}\" already exists",
                        name
                    )));
                }
                Ok(Execution::success(BlockResult::resource("Pod", *name)))
            }
            ["delete", "pod", name] => {
                if !pods.remove(*name) {
                    return Ok(server_error(format!(
                        "Error from server (NotFound): pods \"{}\" not found",
                        name
                    )));
                }
                Ok(Execution::success(BlockResult::text(format!(
                    "pod \"{}\" deleted",
                    name
                ))))
            }
            ["get", "pods"] => Ok(Execution::success(pods_table(
                &pods.iter().map(String::as_str).collect::<Vec<_>>(),
            ))),
            _ => Err(DispatchError::Unavailable(format!(
                "unknown command {:?}",
                command
            ))),
        }
    }
}

fn server_error(message: String) -> Execution {
    Execution::failure(status_code_from_message(&message), message)
}

#[async_trait]
impl CommandDispatcher for FakeCluster {
    async fn execute(&self, command: &str) -> Result<Execution, DispatchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log.lock().push(format!("start:{}", command));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let answer = self.apply(command);

        self.log.lock().push(format!("end:{}", command));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

/// `get pods` output, each row linked to its pod's detail view
pub fn pods_table(names: &[&str]) -> BlockResult {
    BlockResult::Table {
        columns: vec!["NAME".to_string(), "STATUS".to_string()],
        rows: names
            .iter()
            .map(|name| {
                TableRow::new(*name, vec![name.to_string(), "Running".to_string()])
                    .with_detail(DetailRef::resource("pod", name))
            })
            .collect(),
    }
}

/// Run `commands` through a session backed by `dispatcher`
pub async fn record_session(
    dir: &Path,
    dispatcher: Arc<dyn CommandDispatcher>,
    commands: &[&str],
) -> Session {
    let config = Config::default().with_working_dir(dir.to_path_buf());
    let mut session = Session::new(config, dispatcher);
    for command in commands {
        session
            .execute(command)
            .await
            .expect("recording should not fail");
    }
    session
}
