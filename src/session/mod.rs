//! A live session: runs command lines, records them as blocks, and handles
//! the `snapshot` and `replay` controls.

mod command;

pub use command::{ParsedLine, SessionCommand};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::block::{Block, DetailRef};
use crate::config::Config;
use crate::dispatch::{CommandDispatcher, Execution, ProcessDispatcher};
use crate::replay::{ReplayEngine, ReplayError, ReplayEvent, ReplayReport};
use crate::snapshot::{encode_with, write_snapshot, SnapshotIoError, SnapshotMode};
use crate::transcript::{TranscriptStateError, TranscriptStore, TranscriptView};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transcript(#[from] TranscriptStateError),
    #[error("Failed to write snapshot: {0}")]
    Snapshot(#[from] SnapshotIoError),
    #[error("Replay failed: {0}")]
    Replay(#[from] ReplayError),
    #[error("Invalid redact pattern: {0}")]
    RedactPattern(#[from] regex::Error),
    #[error("{0}")]
    Usage(String),
}

/// A snapshot written from the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotWritten {
    pub path: PathBuf,
    pub mode: SnapshotMode,
    pub blocks: usize,
    pub scrubbed: bool,
}

/// What handling one line produced
#[derive(Debug)]
pub enum LineOutcome {
    Empty,
    Executed(Block),
    Snapshot(SnapshotWritten),
    Replayed(ReplayReport),
}

pub struct Session {
    store: TranscriptStore,
    dispatcher: Arc<dyn CommandDispatcher>,
    config: Config,
}

impl Session {
    pub fn new(config: Config, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            store: TranscriptStore::new(),
            dispatcher,
            config,
        }
    }

    /// Session running commands through the configured shell
    pub fn from_config(config: Config) -> Self {
        let mut dispatcher =
            ProcessDispatcher::new(config.shell.clone()).with_working_dir(config.working_dir.clone());
        if let Some(timeout) = config.dispatch_timeout() {
            dispatcher = dispatcher.with_timeout(timeout);
        }
        Self::new(config, Arc::new(dispatcher))
    }

    pub fn id(&self) -> Uuid {
        self.store.session_id()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn view(&self) -> TranscriptView<'_> {
        self.store.view()
    }

    pub fn dispatcher(&self) -> Arc<dyn CommandDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Handle one line typed at the prompt
    pub async fn run_line(&mut self, line: &str) -> Result<LineOutcome, SessionError> {
        match ParsedLine::parse(line).map_err(SessionError::Usage)? {
            ParsedLine::Empty => Ok(LineOutcome::Empty),
            ParsedLine::Command(command) => {
                let block = self.execute(&command).await?;
                Ok(LineOutcome::Executed(block.clone()))
            }
            ParsedLine::Control(SessionCommand::Snapshot {
                path,
                exec,
                shareable,
            }) => {
                let path = self.resolve(&path);
                let written = self
                    .snapshot(&path, SnapshotMode::from_exec_flag(exec), shareable)
                    .await?;
                Ok(LineOutcome::Snapshot(written))
            }
            ParsedLine::Control(SessionCommand::Replay { path }) => {
                let path = self.resolve(&path);
                let report = self.replay(&path, CancellationToken::new(), None).await?;
                Ok(LineOutcome::Replayed(report))
            }
        }
    }

    /// Run a command and record it as a block
    pub async fn execute(&mut self, command: &str) -> Result<&Block, SessionError> {
        let index = self.store.append(command)?.index;

        let execution = match self.dispatcher.execute(command).await {
            Ok(execution) => execution.settled(),
            Err(e) => {
                tracing::warn!(index, command, error = %e, "Dispatch failed");
                Execution::failure(None, e.to_string())
            }
        };

        Ok(self
            .store
            .finalize(index, execution.status, execution.result)?)
    }

    /// Record the detail view the user opened from a block
    pub fn open_detail(&mut self, index: usize, detail_ref: DetailRef) -> Result<&Block, SessionError> {
        Ok(self.store.open_detail(index, detail_ref)?)
    }

    /// Freeze the transcript into a snapshot file
    pub async fn snapshot(
        &self,
        path: &Path,
        mode: SnapshotMode,
        shareable: bool,
    ) -> Result<SnapshotWritten, SessionError> {
        let mut document = encode_with(self.store.view(), mode, self.config.encode_options());

        let scrubbed = shareable || self.config.shareable;
        if scrubbed {
            self.config.scrub_config()?.scrub_document(&mut document);
        }

        write_snapshot(path, &document).await?;
        tracing::info!(
            session_id = %self.id(),
            path = %path.display(),
            mode = %mode,
            blocks = document.len(),
            scrubbed,
            "Wrote snapshot"
        );

        Ok(SnapshotWritten {
            path: path.to_path_buf(),
            mode,
            blocks: document.len(),
            scrubbed,
        })
    }

    /// Replay a snapshot through this session's dispatcher.
    ///
    /// The live transcript is untouched; appends are refused until the
    /// replay returns.
    pub async fn replay(
        &mut self,
        path: &Path,
        cancel: CancellationToken,
        events: Option<mpsc::UnboundedSender<ReplayEvent>>,
    ) -> Result<ReplayReport, SessionError> {
        self.store.begin_replay()?;

        let mut engine = ReplayEngine::new(Arc::clone(&self.dispatcher))
            .with_policy(self.config.reconciliation_policy())
            .with_cancellation(cancel);
        if let Some(events) = events {
            engine = engine.with_events(events);
        }
        let result = engine.replay_file(path).await;

        self.store.end_replay();
        Ok(result?)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.working_dir.join(path)
        }
    }
}
