//! Schedule container and its command reducer.
//!
//! A [`Schedule`] is immutable from the outside: every edit goes through
//! [`Schedule::apply`], which returns a new schedule with the affected tasks'
//! derived fields recomputed. Task lists are shared behind an `Arc` and only
//! copied when a command actually touches them, so readers holding an older
//! schedule never see a half-updated chain.

use std::sync::Arc;

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WorkWeek;
use crate::critical_path::{calculate_critical_path, CriticalPathResult};
use crate::duration::{recompute, OperatingRateTable};
use crate::models::{Link, OperatingRate, ParallelSegment, SubTask, Task, LEGACY_PARALLEL_REMARK};
use crate::overlap;
use crate::solver::{solve_for_crew, solve_for_productivity};

/// Errors from loading or editing a schedule.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),
    #[error("Index {index} out of range for {len} tasks")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Schedule has no start date")]
    MissingStartDate,
    #[error("Task {task_id} falls outside the calendar range")]
    DateOutOfRange { task_id: String },
    #[error("Invalid schedule JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized form of a schedule, as stored by the surrounding system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
    #[serde(default)]
    pub operating_rates: Vec<OperatingRate>,
    #[serde(default)]
    pub work_week: WorkWeek,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

/// A task's physical span mapped onto calendar dates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatedTiming {
    pub task_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub critical: bool,
}

/// One edit to a schedule.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetQuantity { task_id: String, quantity: f64 },
    SetProductivity { task_id: String, productivity: f64 },
    /// Crew sizes below one are raised to one.
    SetCrewSize { task_id: String, crew_size: u32 },
    SetCategory { task_id: String, category: String },
    SetStartOffset { task_id: String, start_offset: Option<f64> },
    SetParallel { task_id: String, parallel: bool },
    SetRemarks { task_id: String, remarks: String },
    /// Keeps the current back overlap. Interior segments are dropped.
    SetFrontOverlap { task_id: String, days: f64 },
    /// Keeps the current front overlap. Interior segments are dropped.
    SetBackOverlap { task_id: String, days: f64 },
    SetParallelSegments {
        task_id: String,
        segments: Vec<ParallelSegment>,
    },
    /// Right-aligned: the parallel share is placed at the end of the task.
    SetApplicationRate { task_id: String, rate_pct: f64 },
    SolveCrewForDuration {
        task_id: String,
        days: f64,
        base_productivity: Option<f64>,
    },
    SolveProductivityForDuration { task_id: String, days: f64 },
    InsertTask { index: usize, task: Task },
    RemoveTask { task_id: String },
    MoveTask { from: usize, to: usize },
    /// Replace the whole task list, e.g. with an accepted optimizer result.
    ReplaceTasks { tasks: Vec<Task> },
    SetWorkWeek(WorkWeek),
    SetOperatingRates(Vec<OperatingRate>),
}

/// Ordered task chain plus the pass-through records that travel with it.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    tasks: Arc<Vec<Task>>,
    links: Arc<Vec<Link>>,
    sub_tasks: Arc<Vec<SubTask>>,
    rates: Arc<OperatingRateTable>,
    work_week: WorkWeek,
    start_date: Option<NaiveDate>,
}

/// `origin` moved by a whole number of days, or `None` past the calendar's range.
fn offset_date(origin: NaiveDate, days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    // Saturating cast; anything beyond i64 is rejected by `try_days` below.
    let delta = chrono::Duration::try_days(days as i64)?;
    origin.checked_add_signed(delta)
}

fn check_unique_ids<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Result<(), ScheduleError> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for task in tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(ScheduleError::DuplicateTaskId(task.id.clone()));
        }
    }
    Ok(())
}

impl Schedule {
    /// Build a schedule from its stored form, recomputing every task.
    ///
    /// Older documents only carry front/back lengths or an application rate;
    /// those are turned into segments here. Tasks whose remark is the legacy
    /// parallel marker get the explicit `parallel` flag.
    pub fn from_document(doc: ScheduleDocument) -> Result<Self, ScheduleError> {
        check_unique_ids(&doc.tasks)?;
        let rates = OperatingRateTable::new(doc.operating_rates);
        let tasks = doc
            .tasks
            .into_iter()
            .map(|task| load_task(task, &rates, doc.work_week))
            .collect();

        Ok(Self {
            tasks: Arc::new(tasks),
            links: Arc::new(doc.links),
            sub_tasks: Arc::new(doc.sub_tasks),
            rates: Arc::new(rates),
            work_week: doc.work_week,
            start_date: doc.start_date,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ScheduleError> {
        let doc: ScheduleDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    pub fn to_document(&self) -> ScheduleDocument {
        ScheduleDocument {
            tasks: self.tasks.as_ref().clone(),
            links: self.links.as_ref().clone(),
            sub_tasks: self.sub_tasks.as_ref().clone(),
            operating_rates: self.rates.records(),
            work_week: self.work_week,
            start_date: self.start_date,
        }
    }

    pub fn to_json(&self) -> Result<String, ScheduleError> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Shared handle to the task list.
    pub fn tasks_arc(&self) -> Arc<Vec<Task>> {
        Arc::clone(&self.tasks)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn sub_tasks(&self) -> &[SubTask] {
        &self.sub_tasks
    }

    pub fn work_week(&self) -> WorkWeek {
        self.work_week
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn with_start_date(&self, start_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            ..self.clone()
        }
    }

    pub fn critical_path(&self) -> CriticalPathResult {
        calculate_critical_path(&self.tasks)
    }

    /// Map each task's span onto calendar dates from the project start date.
    ///
    /// Start days are floored and end days ceiled, so a task occupying part of
    /// a day is shown on that whole day.
    pub fn dated_timings(&self) -> Result<Vec<DatedTiming>, ScheduleError> {
        let origin = self.start_date.ok_or(ScheduleError::MissingStartDate)?;
        self.critical_path()
            .timings
            .into_iter()
            .map(|t| {
                let start = offset_date(origin, t.start.floor());
                let end = offset_date(origin, t.end.ceil());
                match (start, end) {
                    (Some(start), Some(end)) => Ok(DatedTiming {
                        start,
                        end,
                        task_id: t.task_id,
                        critical: t.critical,
                    }),
                    _ => Err(ScheduleError::DateOutOfRange { task_id: t.task_id }),
                }
            })
            .collect()
    }

    /// Apply one command, returning the edited schedule.
    pub fn apply(&self, command: Command) -> Result<Schedule, ScheduleError> {
        let mut next = self.clone();
        match command {
            Command::SetQuantity { task_id, quantity } => {
                next.edit_and_recompute(&task_id, |t| t.quantity = quantity)?
            }
            Command::SetProductivity {
                task_id,
                productivity,
            } => next.edit_and_recompute(&task_id, |t| t.productivity = productivity)?,
            Command::SetCrewSize { task_id, crew_size } => {
                next.edit_and_recompute(&task_id, |t| t.crew_size = crew_size.max(1))?
            }
            Command::SetCategory { task_id, category } => {
                next.edit_and_recompute(&task_id, |t| t.category = category)?
            }
            Command::SetStartOffset {
                task_id,
                start_offset,
            } => next.edit(&task_id, |t| t.start_offset = start_offset)?,
            Command::SetParallel { task_id, parallel } => {
                next.edit(&task_id, |t| t.parallel = parallel)?
            }
            Command::SetRemarks { task_id, remarks } => {
                next.edit(&task_id, |t| t.remarks = remarks)?
            }
            Command::SetFrontOverlap { task_id, days } => next.edit(&task_id, |t| {
                let back = t.back_parallel_days;
                overlap::set_front_back(t, days, back);
            })?,
            Command::SetBackOverlap { task_id, days } => next.edit(&task_id, |t| {
                let front = t.front_parallel_days;
                overlap::set_front_back(t, front, days);
            })?,
            Command::SetParallelSegments { task_id, segments } => next.edit(&task_id, |t| {
                t.parallel_segments = segments;
                overlap::sync_task(t);
            })?,
            Command::SetApplicationRate { task_id, rate_pct } => {
                next.edit(&task_id, |t| overlap::set_application_rate(t, rate_pct))?
            }
            Command::SolveCrewForDuration {
                task_id,
                days,
                base_productivity,
            } => next.edit(&task_id, |t| {
                let old_duration = t.calendar_days;
                *t = solve_for_crew(t, days, base_productivity);
                overlap::refit_task(t, old_duration);
            })?,
            Command::SolveProductivityForDuration { task_id, days } => {
                next.edit(&task_id, |t| {
                    let old_duration = t.calendar_days;
                    *t = solve_for_productivity(t, days);
                    overlap::refit_task(t, old_duration);
                })?
            }
            Command::InsertTask { index, task } => {
                let len = next.tasks.len();
                if index > len {
                    return Err(ScheduleError::IndexOutOfRange { index, len });
                }
                if next.position(&task.id).is_some() {
                    return Err(ScheduleError::DuplicateTaskId(task.id));
                }
                let task = load_task(task, &next.rates, next.work_week);
                Arc::make_mut(&mut next.tasks).insert(index, task);
            }
            Command::RemoveTask { task_id } => {
                let index = next
                    .position(&task_id)
                    .ok_or(ScheduleError::UnknownTask(task_id))?;
                Arc::make_mut(&mut next.tasks).remove(index);
            }
            Command::MoveTask { from, to } => {
                let len = next.tasks.len();
                for index in [from, to] {
                    if index >= len {
                        return Err(ScheduleError::IndexOutOfRange { index, len });
                    }
                }
                let tasks = Arc::make_mut(&mut next.tasks);
                let task = tasks.remove(from);
                tasks.insert(to, task);
            }
            Command::ReplaceTasks { tasks } => {
                check_unique_ids(&tasks)?;
                let tasks = tasks
                    .into_iter()
                    .map(|task| derive(&task, &next.rates, next.work_week))
                    .collect();
                next.tasks = Arc::new(tasks);
            }
            Command::SetWorkWeek(work_week) => {
                next.work_week = work_week;
                next.recompute_all();
            }
            Command::SetOperatingRates(records) => {
                next.rates = Arc::new(OperatingRateTable::new(records));
                next.recompute_all();
            }
        }
        Ok(next)
    }

    /// Run `f` on one task. `f` is responsible for any recompute it needs.
    fn edit(&mut self, task_id: &str, f: impl FnOnce(&mut Task)) -> Result<(), ScheduleError> {
        let index = self
            .position(task_id)
            .ok_or_else(|| ScheduleError::UnknownTask(task_id.to_string()))?;
        f(&mut Arc::make_mut(&mut self.tasks)[index]);
        Ok(())
    }

    /// Run `f` on one task, then recompute its duration and overlap.
    fn edit_and_recompute(
        &mut self,
        task_id: &str,
        f: impl FnOnce(&mut Task),
    ) -> Result<(), ScheduleError> {
        let rates = Arc::clone(&self.rates);
        let work_week = self.work_week;
        self.edit(task_id, |t| {
            f(t);
            *t = derive(t, &rates, work_week);
        })
    }

    fn recompute_all(&mut self) {
        let tasks = self
            .tasks
            .iter()
            .map(|t| derive(t, &self.rates, self.work_week))
            .collect();
        self.tasks = Arc::new(tasks);
    }
}

/// Duration model first, then the overlap refit against the old duration.
fn derive(task: &Task, rates: &OperatingRateTable, work_week: WorkWeek) -> Task {
    let mut derived = recompute(task, rates, work_week);
    overlap::refit_task(&mut derived, task.calendar_days);
    derived
}

/// Recompute a task arriving from outside, adopting legacy overlap fields.
fn load_task(mut task: Task, rates: &OperatingRateTable, work_week: WorkWeek) -> Task {
    if task.remarks.trim() == LEGACY_PARALLEL_REMARK {
        task.parallel = true;
    }
    if !task.parallel_segments.is_empty() {
        return derive(&task, rates, work_week);
    }

    let front = task.front_parallel_days;
    let back = task.back_parallel_days;
    let rate = task.application_rate;
    let mut derived = recompute(&task, rates, work_week);
    if front > 0.0 || back > 0.0 {
        overlap::set_front_back(&mut derived, front, back);
    } else if rate.is_finite() && rate < 100.0 {
        overlap::set_application_rate(&mut derived, rate);
    } else {
        overlap::sync_task(&mut derived);
    }
    derived
}
