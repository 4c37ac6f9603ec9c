//! Async driver: runs an optimization with pauses, cancellation and streaming.
//!
//! The driver pauses between iterations so callers can render progress, checks
//! a [`CancellationToken`] once per iteration, and forwards every new log entry
//! to an optional observer channel. When the run finishes with success or
//! failure it asks the optional [`Summarizer`] for a summary; a failing
//! summarizer is logged and ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};

use crate::log_changes;

use super::log::{LogEntry, RunStatus};
use super::run::{OptimizationOutcome, OptimizationRun};
use super::summary::Summarizer;

/// Shared flag asking a running optimization to stop.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

fn forward(run: &mut OptimizationRun, observer: Option<&UnboundedSender<LogEntry>>) {
    let entries = run.take_new_entries();
    if let Some(tx) = observer {
        for entry in entries {
            // A dropped receiver only means nobody is watching any more.
            let _ = tx.send(entry);
        }
    }
}

async fn request_summary(run: &mut OptimizationRun, summarizer: &dyn Summarizer) {
    let payload = run.summary_payload();
    match summarizer.summarize(&payload).await {
        Ok(Some(text)) if !text.trim().is_empty() => run.push_summary(text),
        Ok(_) => {}
        Err(e) => {
            log_changes!(
                run.config().verbosity,
                "[OPTIMIZE] summary unavailable: {}",
                e
            );
        }
    }
}

/// Drive `run` to completion.
///
/// Cancellation restores the run's original tasks; nothing partial is kept.
pub async fn run_cancellable(
    mut run: OptimizationRun,
    token: CancellationToken,
    observer: Option<UnboundedSender<LogEntry>>,
    summarizer: Option<Arc<dyn Summarizer>>,
) -> OptimizationOutcome {
    let pause = Duration::from_millis(run.config().pause_ms);

    loop {
        if token.is_cancelled() {
            run.cancel();
            forward(&mut run, observer.as_ref());
            break;
        }
        let status = run.step();
        forward(&mut run, observer.as_ref());
        if status.is_terminal() {
            break;
        }
        if pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(pause).await;
        }
    }

    if matches!(run.status(), RunStatus::Success | RunStatus::Fail) {
        if let Some(summarizer) = summarizer.as_deref() {
            request_summary(&mut run, summarizer).await;
            forward(&mut run, observer.as_ref());
        }
    }
    run.into_outcome()
}

/// A run executing on the tokio runtime.
pub struct OptimizationHandle {
    token: CancellationToken,
    events: UnboundedReceiver<LogEntry>,
    join: JoinHandle<OptimizationOutcome>,
}

impl OptimizationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Next log entry, or `None` once the run has finished and the stream is drained.
    pub async fn next_entry(&mut self) -> Option<LogEntry> {
        self.events.recv().await
    }

    /// Wait for the run to finish.
    pub async fn finish(self) -> Result<OptimizationOutcome, JoinError> {
        self.join.await
    }
}

/// Start `run` on the current tokio runtime.
pub fn spawn(run: OptimizationRun, summarizer: Option<Arc<dyn Summarizer>>) -> OptimizationHandle {
    let token = CancellationToken::new();
    let (tx, events) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_cancellable(run, token.clone(), Some(tx), summarizer));
    OptimizationHandle {
        token,
        events,
        join,
    }
}
