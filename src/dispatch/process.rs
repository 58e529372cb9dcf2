use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::block::BlockResult;

use super::runner::{CommandDispatcher, DispatchError, Execution};

/// Runs each command through a shell (`<shell> -c <command>`).
#[derive(Debug, Clone)]
pub struct ProcessDispatcher {
    shell: String,
    timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
}

impl ProcessDispatcher {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: None,
            working_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

#[async_trait]
impl CommandDispatcher for ProcessDispatcher {
    async fn execute(&self, command: &str) -> Result<Execution, DispatchError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let pending = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| DispatchError::Timeout(limit.as_millis() as u64))?,
            None => pending.await,
        }
        .map_err(|e| DispatchError::Spawn(format!("{}: {}", self.shell, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(Execution::success(BlockResult::text(stdout)));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            },
            trimmed => trimmed.to_string(),
        };
        tracing::debug!(
            command,
            exit_code = ?output.status.code(),
            "Command failed"
        );
        Ok(Execution::failure(status_code_from_message(&message), message))
    }
}

fn server_reason_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Error from server \((\w+)\)").ok())
        .as_ref()
}

/// Map a backend error message to an HTTP-style status code.
///
/// Understands the `Error from server (Reason)` form used by Kubernetes
/// clients, and falls back to a couple of plain-language phrases.
pub fn status_code_from_message(message: &str) -> Option<u16> {
    if let Some(caps) = server_reason_re().and_then(|re| re.captures(message)) {
        let code = match &caps[1] {
            "AlreadyExists" | "Conflict" => Some(409),
            "NotFound" => Some(404),
            "Forbidden" => Some(403),
            "Unauthorized" => Some(401),
            "Invalid" => Some(422),
            "BadRequest" => Some(400),
            "ServiceUnavailable" => Some(503),
            _ => None,
        };
        if code.is_some() {
            return code;
        }
    }

    let lower = message.to_ascii_lowercase();
    if lower.contains("already exists") {
        Some(409)
    } else if lower.contains("not found") {
        Some(404)
    } else {
        None
    }
}
