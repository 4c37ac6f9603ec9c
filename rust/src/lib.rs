//! Duration, critical path and compression engine for construction work schedules.
//!
//! The pure model functions live in [`duration`], [`overlap`], [`critical_path`]
//! and [`solver`]. [`schedule`] wraps them in a copy-on-write container edited
//! through commands, and [`optimizer`] shortens a schedule toward a target
//! duration. The `rust` Python module exposes the same operations.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::prelude::*;

pub mod config;
pub mod critical_path;
pub mod duration;
pub mod logging;
pub mod models;
pub mod optimizer;
pub mod overlap;
pub mod schedule;
pub mod solver;

pub use config::{ConfigError, OptimizerConfig, Preset, WorkWeek};
pub use critical_path::{calculate_critical_path, CriticalPathResult, TaskTiming};
pub use duration::{recompute, recompute_with_rate, OperatingRateTable};
pub use models::{Link, OperatingRate, ParallelSegment, SegmentAnchor, SubTask, Task};
pub use optimizer::{OptimizationOutcome, OptimizationRun, OptimizerError, RunStatus};
pub use schedule::{Command, Schedule, ScheduleDocument, ScheduleError};
pub use solver::{solve_for_crew, solve_for_productivity};

fn value_error(e: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

/// Recompute a task's derived fields.
///
/// # Arguments
/// * `task` - Task to recompute
/// * `operating_rates` - Operating rate records keyed by category
/// * `work_week` - Work-week regime: "5d", "6d" or "7d"
///
/// # Raises
/// * ValueError if the work week is unknown
#[pyfunction]
#[pyo3(signature = (task, operating_rates=Vec::new(), work_week=String::from("5d")))]
fn recompute_task(
    task: Task,
    operating_rates: Vec<OperatingRate>,
    work_week: String,
) -> PyResult<Task> {
    let work_week: WorkWeek = work_week.parse().map_err(value_error)?;
    let table = OperatingRateTable::new(operating_rates);
    let mut derived = recompute(&task, &table, work_week);
    overlap::refit_task(&mut derived, task.calendar_days);
    Ok(derived)
}

/// Walk the task chain and report the project duration and critical tasks.
#[pyfunction]
#[pyo3(name = "critical_path")]
fn py_critical_path(tasks: Vec<Task>) -> CriticalPathResult {
    calculate_critical_path(&tasks)
}

/// Crew size (rounded up) that finishes `task` in `target_days`.
#[pyfunction]
#[pyo3(signature = (task, target_days, base_productivity=None))]
fn solve_crew(task: Task, target_days: f64, base_productivity: Option<f64>) -> Task {
    let mut solved = solve_for_crew(&task, target_days, base_productivity);
    overlap::refit_task(&mut solved, task.calendar_days);
    solved
}

/// Productivity that finishes `task` in `target_days` with its current crew.
#[pyfunction]
fn solve_productivity(task: Task, target_days: f64) -> Task {
    let mut solved = solve_for_productivity(&task, target_days);
    overlap::refit_task(&mut solved, task.calendar_days);
    solved
}

/// Set the application rate; the parallel share is placed at the end of the task.
#[pyfunction]
fn set_application_rate(mut task: Task, rate_pct: f64) -> Task {
    overlap::set_application_rate(&mut task, rate_pct);
    task
}

/// Replace a task's parallel segments with front and back overlaps.
#[pyfunction]
fn set_front_back_overlap(mut task: Task, front_days: f64, back_days: f64) -> Task {
    overlap::set_front_back(&mut task, front_days, back_days);
    task
}

/// Compress a schedule toward `target_days`.
///
/// Runs without pauses; use the Rust driver for a cancellable run.
///
/// # Arguments
/// * `tasks` - Tasks in schedule order, with derived fields filled in
/// * `target_days` - Target total duration
/// * `preset` - Weight preset: "balanced", "min" or "max" (ignored when `config` is given)
/// * `config` - Full optimizer configuration
///
/// # Returns
/// * (status, final_days, tasks, log) where log is a list of (kind, message)
///
/// # Raises
/// * ValueError on an unknown preset, an invalid target or an empty task list
#[pyfunction]
#[pyo3(signature = (tasks, target_days, preset=String::from("balanced"), config=None))]
#[allow(clippy::type_complexity)]
fn optimize(
    tasks: Vec<Task>,
    target_days: f64,
    preset: String,
    config: Option<OptimizerConfig>,
) -> PyResult<(String, f64, Vec<Task>, Vec<(String, String)>)> {
    let config = match config {
        Some(config) => config,
        None => OptimizerConfig::from_preset(preset.parse::<Preset>().map_err(value_error)?),
    };
    let run = OptimizationRun::new(std::sync::Arc::new(tasks), target_days, config)
        .map_err(value_error)?;
    let outcome = run.run_blocking();

    let log = outcome
        .log
        .iter()
        .map(|e| (e.kind.as_str().to_string(), e.message.clone()))
        .collect();
    Ok((
        outcome.status.as_str().to_string(),
        outcome.final_days,
        outcome.tasks,
        log,
    ))
}

/// Load a schedule document, recompute every task and serialize it again.
///
/// # Raises
/// * ValueError on malformed JSON or duplicate task IDs
#[pyfunction]
fn recompute_schedule_json(json: String) -> PyResult<String> {
    Schedule::from_json(&json)
        .and_then(|s| s.to_json())
        .map_err(value_error)
}

/// The worksched.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Task>()?;
    m.add_class::<ParallelSegment>()?;
    m.add_class::<OperatingRate>()?;
    m.add_class::<TaskTiming>()?;
    m.add_class::<CriticalPathResult>()?;

    // Config types
    m.add_class::<OptimizerConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(recompute_task, m)?)?;
    m.add_function(wrap_pyfunction!(py_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(solve_crew, m)?)?;
    m.add_function(wrap_pyfunction!(solve_productivity, m)?)?;
    m.add_function(wrap_pyfunction!(set_application_rate, m)?)?;
    m.add_function(wrap_pyfunction!(set_front_back_overlap, m)?)?;
    m.add_function(wrap_pyfunction!(optimize, m)?)?;
    m.add_function(wrap_pyfunction!(recompute_schedule_json, m)?)?;

    Ok(())
}
