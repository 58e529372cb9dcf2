use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::CommandDispatcher;
use crate::snapshot::codec::validate;
use crate::snapshot::{decode, DecodeError, SnapshotDocument};
use crate::transcript::{Transcript, TranscriptStateError};

use super::events::{RenderedBlock, ReplayEvent, ReplayPhase, ReplayReport};
use super::reconcile::ReconciliationPolicy;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Transcript(#[from] TranscriptStateError),
}

/// Rebuilds a transcript from a snapshot document.
///
/// Static blocks are redrawn from the recording. Re-executable blocks are
/// resubmitted through the dispatcher strictly in ascending index order, each
/// awaited and reconciled before the next one starts.
pub struct ReplayEngine {
    dispatcher: Arc<dyn CommandDispatcher>,
    policy: ReconciliationPolicy,
    events: Option<mpsc::UnboundedSender<ReplayEvent>>,
    cancel: CancellationToken,
}

impl ReplayEngine {
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            dispatcher,
            policy: ReconciliationPolicy::default(),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: ReconciliationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stream phase changes and rendered blocks to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ReplayEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Abandon the replay when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn replay_file(&self, path: &Path) -> Result<ReplayReport, ReplayError> {
        self.enter(ReplayPhase::Loading);
        let bytes = tokio::fs::read(path).await?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "Loaded snapshot");
        self.replay_loaded(&bytes).await
    }

    pub async fn replay_bytes(&self, bytes: &[u8]) -> Result<ReplayReport, ReplayError> {
        self.enter(ReplayPhase::Loading);
        self.replay_loaded(bytes).await
    }

    async fn replay_loaded(&self, bytes: &[u8]) -> Result<ReplayReport, ReplayError> {
        // Decode failures abort before anything is rebuilt or resubmitted.
        let document = decode(bytes).map_err(|err| {
            tracing::warn!(error = %err, "Snapshot failed to decode");
            err
        })?;
        self.replay_document(&document).await
    }

    /// Replay an already-decoded document.
    ///
    /// The document is checked like a decoded one first, so an invalid
    /// document never reaches the dispatcher.
    pub async fn replay_document(
        &self,
        document: &SnapshotDocument,
    ) -> Result<ReplayReport, ReplayError> {
        validate(document).map_err(|err| {
            tracing::warn!(error = %err, "Snapshot document is invalid");
            err
        })?;

        self.enter(ReplayPhase::Rebuilding);
        tracing::info!(
            mode = %document.mode,
            blocks = document.len(),
            "Rebuilding transcript"
        );

        let mut transcript = Transcript::new();
        let mut rendered = Vec::with_capacity(document.len());
        let mut cancelled = false;
        let rebuilt_at = Utc::now();

        for recorded in &document.blocks {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let block = recorded.to_block(rebuilt_at);
            let item = if document.mode.is_reexec() && recorded.reexecutable {
                self.enter(ReplayPhase::Reexecuting {
                    index: recorded.index,
                });
                let started = Utc::now();

                let live = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    live = self.dispatcher.execute(&recorded.command) => Some(live),
                };
                let Some(live) = live else {
                    tracing::info!(index = recorded.index, "Replay cancelled mid-resubmission");
                    cancelled = true;
                    break;
                };

                let reconciliation = self.policy.reconcile(&block, live);
                tracing::debug!(
                    index = recorded.index,
                    command = %recorded.command,
                    outcome = %reconciliation.outcome,
                    status_code = ?reconciliation.status_code,
                    "Reconciled block"
                );

                let mut item = RenderedBlock::reconciled(block, reconciliation);
                item.block.start_time = started;
                item.block.completion_time = Some(Utc::now().max(started));
                item
            } else {
                self.enter(ReplayPhase::Idle {
                    index: recorded.index,
                });
                RenderedBlock::recorded(block)
            };

            transcript.push_rendered(item.block.clone())?;
            self.emit(ReplayEvent::BlockRendered(item.clone()));
            rendered.push(item);
        }

        self.enter(ReplayPhase::Done);
        let report = ReplayReport {
            mode: document.mode,
            blocks: rendered,
            transcript,
            cancelled,
            expected: document.len(),
        };
        tracing::info!(
            rendered = report.blocks.len(),
            expected = report.expected,
            cancelled,
            "Replay finished"
        );
        Ok(report)
    }

    fn enter(&self, phase: ReplayPhase) {
        tracing::trace!(?phase, "Replay phase");
        self.emit(ReplayEvent::Phase(phase));
    }

    fn emit(&self, event: ReplayEvent) {
        if let Some(events) = &self.events {
            // Presentation may have gone away; replay carries on regardless.
            let _ = events.send(event);
        }
    }
}
