//! The optimization run state machine.
//!
//! A run owns a working copy of the task list and advances one iteration per
//! [`OptimizationRun::step`] call:
//!
//! 1. Walk the working copy to find the critical tasks
//! 2. Evaluate crew and productivity moves for each of them
//! 3. Commit the best-scoring eligible move
//! 4. Stop on success, on exhaustion or after repeated low-saving iterations
//!
//! The live schedule is never touched; [`OptimizationOutcome::commit`] is the
//! separate step that hands the result back.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, OptimizerConfig};
use crate::critical_path::calculate_critical_path;
use crate::logging::echo_entry;
use crate::models::Task;
use crate::schedule::{Command, Schedule, ScheduleError};

use super::candidates::{by_score, Adjustment, Baseline, Candidate, Evaluation, MoveKind};
use super::log::{LogEntry, LogKind, RejectReason, RunStatus};
use super::summary::SummaryPayload;

const EPS: f64 = 1e-9;

/// Errors from starting or committing an optimization run.
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Target duration must be a positive number of days, got {0}")]
    InvalidTarget(f64),
    #[error("Schedule has no tasks")]
    EmptySchedule,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("A cancelled optimization run cannot be committed")]
    CancelledRun,
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// A move committed to the working copy.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedStep {
    pub iteration: u32,
    pub task_id: String,
    pub kind: MoveKind,
    pub saved_days: f64,
    /// Project duration after this step.
    pub total_after: f64,
    pub score: f64,
    pub description: String,
}

/// One compression attempt against a snapshot of a schedule's tasks.
pub struct OptimizationRun {
    config: OptimizerConfig,
    original: Arc<Vec<Task>>,
    working: Vec<Task>,
    baselines: Vec<Baseline>,
    adjustments: Vec<Adjustment>,
    target_days: f64,
    initial_total: f64,
    current_total: f64,
    iteration: u32,
    stalled: u32,
    status: RunStatus,
    log: Vec<LogEntry>,
    steps: Vec<AppliedStep>,
    constraints: Vec<String>,
    /// Log entries before this index were already handed out.
    emitted: usize,
}

impl OptimizationRun {
    /// Prepare a run. The snapshot is kept so cancellation can restore it.
    pub fn new(
        tasks: Arc<Vec<Task>>,
        target_days: f64,
        config: OptimizerConfig,
    ) -> Result<Self, OptimizerError> {
        if !(target_days.is_finite() && target_days > 0.0) {
            return Err(OptimizerError::InvalidTarget(target_days));
        }
        if tasks.is_empty() {
            return Err(OptimizerError::EmptySchedule);
        }
        config.validate()?;

        let working: Vec<Task> = tasks.as_ref().clone();
        let baselines: Vec<Baseline> = working.iter().map(Baseline::of).collect();
        let adjustments = baselines.iter().map(Adjustment::initial).collect();
        let initial_total = calculate_critical_path(&working).total_days;

        Ok(Self {
            config,
            original: tasks,
            working,
            baselines,
            adjustments,
            target_days,
            initial_total,
            current_total: initial_total,
            iteration: 0,
            stalled: 0,
            status: RunStatus::Idle,
            log: Vec::new(),
            steps: Vec::new(),
            constraints: Vec::new(),
            emitted: 0,
        })
    }

    /// Prepare a run against a schedule's current tasks.
    pub fn from_schedule(
        schedule: &Schedule,
        target_days: f64,
        config: OptimizerConfig,
    ) -> Result<Self, OptimizerError> {
        Self::new(schedule.tasks_arc(), target_days, config)
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn target_days(&self) -> f64 {
        self.target_days
    }

    pub fn initial_total(&self) -> f64 {
        self.initial_total
    }

    pub fn current_total(&self) -> f64 {
        self.current_total
    }

    pub fn tasks(&self) -> &[Task] {
        &self.working
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn steps(&self) -> &[AppliedStep] {
        &self.steps
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Smallest project saving a move must reach to be committed.
    pub fn min_saving(&self) -> f64 {
        (0.002 * self.initial_total).max(0.05)
    }

    /// Savings below this count toward the stall limit.
    ///
    /// Never above [`min_saving`](Self::min_saving), so a committed move
    /// always clears it with the built-in thresholds.
    pub fn stall_threshold(&self) -> f64 {
        (0.001 * self.initial_total).max(0.02)
    }

    /// Record the saving of a committed move. Returns true once the stall
    /// limit of consecutive low savings is reached.
    fn note_saving(&mut self, saved: f64) -> bool {
        if saved < self.stall_threshold() {
            self.stalled += 1;
        } else {
            self.stalled = 0;
        }
        self.stalled >= self.config.stall_limit
    }

    fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        let entry = LogEntry::new(kind, message);
        echo_entry(self.config.verbosity, &entry);
        self.log.push(entry);
    }

    fn finish(&mut self, status: RunStatus, message: String) {
        self.status = status;
        self.push(LogKind::Result, message);
    }

    /// Advance one iteration. Returns the status afterwards.
    ///
    /// Calling this on a finished run does nothing.
    pub fn step(&mut self) -> RunStatus {
        match self.status {
            RunStatus::Idle => {
                self.status = RunStatus::Running;
                let message = format!(
                    "Optimization started: {:.1} days, target {:.1} days",
                    self.current_total, self.target_days
                );
                self.push(LogKind::Status, message);
            }
            RunStatus::Running => {}
            terminal => return terminal,
        }

        if self.current_total <= self.target_days + EPS {
            self.finish(
                RunStatus::Success,
                format!(
                    "Target reached: {:.1} days (target {:.1})",
                    self.current_total, self.target_days
                ),
            );
            return self.status;
        }
        if self.iteration >= self.config.max_iterations {
            self.finish(
                RunStatus::Fail,
                format!(
                    "Iteration limit of {} reached at {:.1} days (target {:.1})",
                    self.config.max_iterations, self.current_total, self.target_days
                ),
            );
            return self.status;
        }

        self.iteration += 1;
        self.push(
            LogKind::Status,
            format!(
                "Iteration {}: {:.1} days, {:.1} days to go",
                self.iteration,
                self.current_total,
                self.current_total - self.target_days
            ),
        );

        let (best, rejections) = self.evaluate_critical_tasks();

        for (index, reason) in rejections {
            let label = self.working[index].label().to_string();
            self.push(LogKind::Reason, format!("{}: {}", label, reason.code()));
            let code = reason.code().to_string();
            if !self.constraints.contains(&code) {
                self.constraints.push(code);
            }
        }

        let Some(best) = best else {
            self.finish(
                RunStatus::Fail,
                format!(
                    "No eligible move on the critical path at {:.1} days (target {:.1})",
                    self.current_total, self.target_days
                ),
            );
            return self.status;
        };

        let saved = self.commit_candidate(best);
        let stalled_out = self.note_saving(saved);

        if self.current_total <= self.target_days + EPS {
            self.finish(
                RunStatus::Success,
                format!(
                    "Target reached: {:.1} -> {:.1} days in {} steps",
                    self.initial_total,
                    self.current_total,
                    self.steps.len()
                ),
            );
        } else if stalled_out {
            self.finish(
                RunStatus::Fail,
                format!(
                    "Savings stalled for {} iterations at {:.1} days (target {:.1})",
                    self.stalled, self.current_total, self.target_days
                ),
            );
        }
        self.status
    }

    fn evaluate_critical_tasks(&self) -> (Option<Candidate>, Vec<(usize, RejectReason)>) {
        let critical = calculate_critical_path(&self.working);
        let evaluation = Evaluation {
            tasks: &self.working,
            current_total: self.current_total,
            target_days: self.target_days,
            min_saving: self.min_saving(),
            config: &self.config,
        };

        let mut best: Option<Candidate> = None;
        let mut rejections = Vec::new();
        for index in critical.critical_indices() {
            match evaluation.evaluate_task(index, &self.baselines[index], self.adjustments[index]) {
                Ok(candidate) => {
                    let better = best
                        .as_ref()
                        .map(|b| by_score(&candidate, b) == Ordering::Greater)
                        .unwrap_or(true);
                    if better {
                        best = Some(candidate);
                    }
                }
                Err(reason) => rejections.push((index, reason)),
            }
        }
        (best, rejections)
    }

    /// Write a candidate into the working copy. Returns the days it saved.
    fn commit_candidate(&mut self, candidate: Candidate) -> f64 {
        let index = candidate.index;
        let before = self.working[index].calendar_days;
        let saved = self.current_total - candidate.new_total;
        let description = describe(
            &self.working[index],
            &candidate,
            before,
            saved,
            self.target_days,
        );
        self.push(LogKind::Step, description.clone());
        self.steps.push(AppliedStep {
            iteration: self.iteration,
            task_id: candidate.task.id.clone(),
            kind: candidate.kind,
            saved_days: saved,
            total_after: candidate.new_total,
            score: candidate.score,
            description,
        });

        self.current_total = candidate.new_total;
        self.adjustments[index] = candidate.adjustment;
        self.working[index] = candidate.task;
        saved
    }

    /// Abandon the run and restore the snapshot. Finished runs are left alone.
    pub fn cancel(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.working = self.original.as_ref().clone();
        self.adjustments = self.baselines.iter().map(Adjustment::initial).collect();
        self.current_total = self.initial_total;
        self.steps.clear();
        self.status = RunStatus::Cancelled;
        self.push(LogKind::Status, "Optimization cancelled; no changes applied");
    }

    /// Log entries added since the previous call.
    pub fn take_new_entries(&mut self) -> Vec<LogEntry> {
        let fresh = self.log[self.emitted..].to_vec();
        self.emitted = self.log.len();
        fresh
    }

    /// Facts about the run for the external summarizer.
    pub fn summary_payload(&self) -> SummaryPayload {
        SummaryPayload {
            target_days: self.target_days,
            current_days: self.current_total,
            saved_days: self.initial_total - self.current_total,
            remaining_days: (self.current_total - self.target_days).max(0.0),
            status: self.status,
            critical_steps: self.steps.iter().map(|s| s.description.clone()).collect(),
            constraints: self.constraints.clone(),
        }
    }

    /// Append an externally produced summary to the log.
    pub fn push_summary(&mut self, summary: impl Into<String>) {
        self.push(LogKind::Summary, summary);
    }

    /// Step until the run finishes, without pausing between iterations.
    pub fn run_blocking(mut self) -> OptimizationOutcome {
        while !self.step().is_terminal() {}
        self.into_outcome()
    }

    pub fn into_outcome(self) -> OptimizationOutcome {
        let critical_task_ids = calculate_critical_path(&self.working).critical_task_ids;
        OptimizationOutcome {
            status: self.status,
            target_days: self.target_days,
            initial_days: self.initial_total,
            final_days: self.current_total,
            tasks: self.working,
            steps: self.steps,
            log: self.log,
            critical_task_ids,
        }
    }
}

/// Step log line: the move, its effect, what is left, and what it beat.
fn describe(task: &Task, candidate: &Candidate, before: f64, saved: f64, target: f64) -> String {
    let change = match candidate.kind {
        MoveKind::Crew { .. } => format!(
            "{} (efficiency {:.0}%)",
            candidate.kind,
            candidate.efficiency * 100.0
        ),
        MoveKind::Productivity { .. } => candidate.kind.to_string(),
    };
    let remaining = candidate.new_total - target;
    let progress = if remaining <= EPS {
        "target reached".to_string()
    } else {
        format!("{:.1} days to target", remaining)
    };
    let rationale = match &candidate.runner_up {
        Some(runner_up) => format!(
            "runner-up {} (score {:.2})",
            runner_up.kind, runner_up.score
        ),
        None => format!("no eligible {} move", candidate.kind.other_family()),
    };
    format!(
        "{}: {}, {:.1} -> {:.1} days, project -{:.1} days, {}; score {:.2}, {}",
        task.label(),
        change,
        before,
        candidate.task.calendar_days,
        saved,
        progress,
        candidate.score,
        rationale
    )
}

/// Final state of a run.
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
    pub status: RunStatus,
    pub target_days: f64,
    pub initial_days: f64,
    pub final_days: f64,
    /// The working copy at the end of the run. The original tasks when cancelled.
    pub tasks: Vec<Task>,
    pub steps: Vec<AppliedStep>,
    pub log: Vec<LogEntry>,
    pub critical_task_ids: Vec<String>,
}

impl OptimizationOutcome {
    pub fn saved_days(&self) -> f64 {
        self.initial_days - self.final_days
    }

    /// Replace `schedule`'s tasks with the optimized ones.
    pub fn commit(&self, schedule: &Schedule) -> Result<Schedule, OptimizerError> {
        if self.status == RunStatus::Cancelled {
            return Err(OptimizerError::CancelledRun);
        }
        Ok(schedule.apply(Command::ReplaceTasks {
            tasks: self.tasks.clone(),
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleDocument;

    fn schedule_of(tasks: Vec<Task>) -> Schedule {
        Schedule::from_document(ScheduleDocument {
            tasks,
            ..ScheduleDocument::default()
        })
        .unwrap()
    }

    fn single() -> Schedule {
        schedule_of(vec![Task::new("t").with_work(480.0, 10.0, 2)])
    }

    #[test]
    fn test_single_task_reaches_target() {
        let schedule = single();
        let mut run = OptimizationRun::from_schedule(&schedule, 20.0, OptimizerConfig::default())
            .unwrap();
        assert!((run.initial_total() - 24.0).abs() < 1e-9);

        let mut calls = 0;
        while !run.step().is_terminal() {
            calls += 1;
            assert!(calls < 5);
        }
        assert_eq!(run.status(), RunStatus::Success);
        assert!(run.iteration() <= 5);
        assert!(run.current_total() <= 20.0);

        let outcome = run.into_outcome();
        assert!(outcome.final_days <= 20.0);
        assert!(outcome.saved_days() >= 4.0);
        assert!(!outcome.steps.is_empty());
        assert_eq!(outcome.critical_task_ids, vec!["t"]);
    }

    #[test]
    fn test_log_shape() {
        let outcome = OptimizationRun::from_schedule(&single(), 20.0, OptimizerConfig::default())
            .unwrap()
            .run_blocking();
        assert_eq!(outcome.log.first().unwrap().kind, LogKind::Status);
        assert!(outcome.log.iter().any(|e| e.kind == LogKind::Step));
        assert_eq!(outcome.log.last().unwrap().kind, LogKind::Result);
    }

    #[test]
    fn test_step_log_explains_the_move() {
        let mut run =
            OptimizationRun::from_schedule(&single(), 20.0, OptimizerConfig::default()).unwrap();
        run.step();
        let step = run.log().iter().find(|e| e.kind == LogKind::Step).unwrap();
        // Crew +1 reaches 16.8 days; the best productivity move lost on score.
        assert!(step.message.contains("crew 2 -> 3"), "{}", step.message);
        assert!(step.message.contains("target reached"), "{}", step.message);
        assert!(step.message.contains("runner-up productivity"), "{}", step.message);

        let mut far = OptimizationRun::from_schedule(&single(), 1.0, OptimizerConfig::default())
            .unwrap();
        far.step();
        let step = far.log().iter().find(|e| e.kind == LogKind::Step).unwrap();
        assert!(step.message.contains("days to target"), "{}", step.message);
    }

    #[test]
    fn test_stall_counter() {
        let mut run =
            OptimizationRun::from_schedule(&single(), 20.0, OptimizerConfig::default()).unwrap();
        let low = run.stall_threshold() / 2.0;
        assert!(!run.note_saving(low));
        assert!(!run.note_saving(low));
        // A real saving resets the streak.
        assert!(!run.note_saving(1.0));
        assert!(!run.note_saving(low));
        assert!(!run.note_saving(low));
        assert!(run.note_saving(low));
        assert!(run.stall_threshold() <= run.min_saving());
    }

    #[test]
    fn test_already_at_target() {
        let schedule = single();
        let outcome = OptimizationRun::from_schedule(&schedule, 30.0, OptimizerConfig::default())
            .unwrap()
            .run_blocking();
        assert_eq!(outcome.status, RunStatus::Success);
        assert!(outcome.steps.is_empty());
        assert_eq!(outcome.tasks, schedule.tasks());
    }

    #[test]
    fn test_unreachable_target_fails_within_caps() {
        let schedule = schedule_of(vec![
            Task::new("a").with_work(480.0, 10.0, 2),
            Task::new("b").with_work(300.0, 5.0, 3),
        ]);
        let config = OptimizerConfig::default();
        let outcome = OptimizationRun::from_schedule(&schedule, 1.0, config.clone())
            .unwrap()
            .run_blocking();

        assert_eq!(outcome.status, RunStatus::Fail);
        assert!(outcome.final_days < outcome.initial_days);
        assert!(outcome.steps.len() as u32 <= config.max_iterations);

        for (before, after) in schedule.tasks().iter().zip(&outcome.tasks) {
            assert!(after.crew_size >= before.crew_size);
            assert!(after.crew_size <= before.crew_size + config.max_crew_delta);
            let ceiling = before.productivity * (1.0 + config.max_productivity_pct / 100.0);
            assert!(after.productivity <= ceiling + 1e-9);
        }
        for step in &outcome.steps {
            match step.kind {
                MoveKind::Crew { from, to } => assert!(to > from && to - from <= 3),
                MoveKind::Productivity { from_pct, to_pct } => {
                    assert!(to_pct > from_pct && to_pct - from_pct <= 15.0 + 1e-9)
                }
            }
        }
        assert!(outcome
            .log
            .iter()
            .any(|e| e.kind == LogKind::Reason && e.message.contains("CONGESTION_LIMIT")));
    }

    #[test]
    fn test_unsolvable_schedule_fails_with_blocked_reason() {
        let schedule = schedule_of(vec![Task::new("empty")]);
        // Zero-length schedule against a positive target succeeds immediately,
        // so give the task a fixed duration the optimizer cannot touch.
        let fixed = schedule
            .apply(Command::SolveCrewForDuration {
                task_id: "empty".to_string(),
                days: 10.0,
                base_productivity: None,
            })
            .unwrap();
        let mut run =
            OptimizationRun::from_schedule(&fixed, 5.0, OptimizerConfig::default()).unwrap();
        assert_eq!(run.step(), RunStatus::Fail);
        assert_eq!(run.summary_payload().constraints, vec!["CONSTRAINT_BLOCKED"]);
    }

    #[test]
    fn test_cancel_restores_snapshot() {
        let schedule = single();
        let mut run = OptimizationRun::from_schedule(&schedule, 1.0, OptimizerConfig::default())
            .unwrap();
        run.step();
        assert_eq!(run.steps().len(), 1);
        assert_ne!(run.tasks(), schedule.tasks());

        run.cancel();
        assert_eq!(run.status(), RunStatus::Cancelled);
        assert_eq!(run.tasks(), schedule.tasks());
        assert_eq!(run.step(), RunStatus::Cancelled);

        let outcome = run.into_outcome();
        assert!(outcome.steps.is_empty());
        assert!(matches!(
            outcome.commit(&schedule),
            Err(OptimizerError::CancelledRun)
        ));
    }

    #[test]
    fn test_commit_replaces_tasks() {
        let schedule = single();
        let outcome = OptimizationRun::from_schedule(&schedule, 20.0, OptimizerConfig::default())
            .unwrap()
            .run_blocking();
        let committed = outcome.commit(&schedule).unwrap();
        assert!(committed.critical_path().total_days <= 20.0);
        // The live schedule only changes through the commit.
        assert!((schedule.critical_path().total_days - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        let schedule = single();
        for target in [0.0, -3.0, f64::NAN] {
            assert!(matches!(
                OptimizationRun::from_schedule(&schedule, target, OptimizerConfig::default()),
                Err(OptimizerError::InvalidTarget(_))
            ));
        }
        assert!(matches!(
            OptimizationRun::new(Arc::new(Vec::new()), 10.0, OptimizerConfig::default()),
            Err(OptimizerError::EmptySchedule)
        ));
        let bad = OptimizerConfig {
            stall_limit: 0,
            ..OptimizerConfig::default()
        };
        assert!(matches!(
            OptimizationRun::from_schedule(&schedule, 10.0, bad),
            Err(OptimizerError::Config(_))
        ));
    }

    #[test]
    fn test_new_entries_are_handed_out_once() {
        let mut run =
            OptimizationRun::from_schedule(&single(), 20.0, OptimizerConfig::default()).unwrap();
        run.step();
        let first = run.take_new_entries();
        assert!(!first.is_empty());
        assert!(run.take_new_entries().is_empty());
    }

    #[test]
    fn test_summary_payload() {
        let mut run =
            OptimizationRun::from_schedule(&single(), 20.0, OptimizerConfig::default()).unwrap();
        while !run.step().is_terminal() {}
        let payload = run.summary_payload();
        assert_eq!(payload.status, RunStatus::Success);
        assert_eq!(payload.remaining_days, 0.0);
        assert!((payload.saved_days + payload.current_days - 24.0).abs() < 1e-9);
        assert_eq!(payload.critical_steps.len(), run.steps().len());

        run.push_summary("Added one person to t.");
        assert_eq!(run.log().last().unwrap().kind, LogKind::Summary);
    }
}
