//! Compression optimizer: shortens a schedule toward a target total duration.
//!
//! Each iteration looks at the tasks on the critical path, tries adding crew
//! and boosting productivity on each of them, and commits the single move with
//! the best weighted score. Adding crew beyond a task's original size costs
//! per-person efficiency, so the optimizer weighs both families against each
//! other instead of always reaching for more people.
//!
//! - [`OptimizationRun`] is the synchronous state machine (`step`, `cancel`)
//! - [`run_cancellable`] and [`spawn`] drive it on tokio with pauses,
//!   cancellation and a log stream
//! - [`Summarizer`] is the hook for the external summary service

mod candidates;
mod driver;
mod log;
mod run;
mod summary;

pub use candidates::{
    efficiency, materialize, score, Adjustment, Baseline, Candidate, MoveKind, RunnerUp,
};
pub use driver::{run_cancellable, spawn, CancellationToken, OptimizationHandle};
pub use log::{LogEntry, LogKind, RejectReason, RunStatus};
pub use run::{AppliedStep, OptimizationOutcome, OptimizationRun, OptimizerError};
pub use summary::{Summarizer, SummaryError, SummaryPayload};
