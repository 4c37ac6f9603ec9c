//! Core data types for construction work schedules.
//!
//! Records arrive from and are written back to an external store as JSON
//! objects. Fields this crate does not understand are kept in `extra` so a
//! load/save cycle never drops data.

use pyo3::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-text remark that older containers use to mark a pure parallel task.
///
/// Only consulted when loading a document; the explicit `parallel` flag is
/// what the critical path calculation reads.
pub const LEGACY_PARALLEL_REMARK: &str = "병행작업";

fn default_rate_pct() -> f64 {
    100.0
}

fn default_crew_size() -> u32 {
    1
}

/// Which end of its task a parallel segment was placed against.
///
/// A segment covering the whole task touches both ends, so the anchor is the
/// only way to tell a full front overlap from a full back overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentAnchor {
    #[default]
    Free,
    Front,
    Back,
}

impl SegmentAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentAnchor::Free => "free",
            SegmentAnchor::Front => "front",
            SegmentAnchor::Back => "back",
        }
    }

    fn is_free(&self) -> bool {
        *self == SegmentAnchor::Free
    }
}

/// A day range inside a task, relative to the task's own start, during which
/// the task runs alongside a neighbor and is off the critical path.
#[pyclass]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallelSegment {
    #[pyo3(get, set)]
    pub start: f64,
    #[pyo3(get, set)]
    pub end: f64,
    #[serde(default, skip_serializing_if = "SegmentAnchor::is_free")]
    pub anchor: SegmentAnchor,
}

impl ParallelSegment {
    pub fn span(start: f64, end: f64) -> Self {
        Self::anchored(start, end, SegmentAnchor::Free)
    }

    pub fn anchored(start: f64, end: f64, anchor: SegmentAnchor) -> Self {
        Self { start, end, anchor }
    }

    /// Number of days covered (never negative).
    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[pymethods]
impl ParallelSegment {
    #[new]
    fn new(start: f64, end: f64) -> Self {
        Self::span(start, end)
    }

    #[getter(anchor)]
    fn py_anchor(&self) -> &'static str {
        self.anchor.as_str()
    }

    fn __repr__(&self) -> String {
        format!(
            "ParallelSegment(start={}, end={}, anchor={})",
            self.start,
            self.end,
            self.anchor.as_str()
        )
    }
}

/// One unit of work in a schedule.
///
/// `daily_production`, `working_days`, `operating_rate_value`,
/// `calendar_days` and `calendar_months` are derived by the duration model
/// and are only ever written together. `front_parallel_days`,
/// `back_parallel_days` and `application_rate` are projections of
/// `parallel_segments`, which is the authoritative overlap description.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    #[serde(default)]
    pub name: String,
    /// Work category, used to look up the operating rate.
    #[pyo3(get, set)]
    #[serde(default)]
    pub category: String,
    #[pyo3(get, set)]
    #[serde(default)]
    pub quantity: f64,
    /// Work units per crew member per day.
    #[pyo3(get, set)]
    #[serde(default)]
    pub productivity: f64,
    #[pyo3(get, set)]
    #[serde(default = "default_crew_size")]
    pub crew_size: u32,
    /// Operating rate percentage actually applied on the last recompute.
    #[pyo3(get, set)]
    #[serde(default = "default_rate_pct")]
    pub operating_rate_value: f64,
    #[pyo3(get, set)]
    #[serde(default)]
    pub daily_production: f64,
    #[pyo3(get, set)]
    #[serde(default)]
    pub working_days: f64,
    #[pyo3(get, set)]
    #[serde(default)]
    pub calendar_days: f64,
    #[pyo3(get, set)]
    #[serde(default)]
    pub calendar_months: f64,
    /// Absolute start day. `None` chains the task after its predecessor.
    #[pyo3(get, set)]
    #[serde(default)]
    pub start_offset: Option<f64>,
    #[pyo3(get, set)]
    #[serde(default)]
    pub front_parallel_days: f64,
    #[pyo3(get, set)]
    #[serde(default)]
    pub back_parallel_days: f64,
    #[pyo3(get, set)]
    #[serde(default)]
    pub parallel_segments: Vec<ParallelSegment>,
    /// Percentage of the duration that counts toward the critical path.
    #[pyo3(get, set)]
    #[serde(default = "default_rate_pct")]
    pub application_rate: f64,
    /// Pure parallel task: never reported as critical.
    #[pyo3(get, set)]
    #[serde(default)]
    pub parallel: bool,
    #[pyo3(get, set)]
    #[serde(default)]
    pub remarks: String,
    /// Fields owned by the surrounding system, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Creates an unconfigured task (no quantity, no productivity, crew of one).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            category: String::new(),
            quantity: 0.0,
            productivity: 0.0,
            crew_size: 1,
            operating_rate_value: 100.0,
            daily_production: 0.0,
            working_days: 0.0,
            calendar_days: 0.0,
            calendar_months: 0.0,
            start_offset: None,
            front_parallel_days: 0.0,
            back_parallel_days: 0.0,
            parallel_segments: Vec::new(),
            application_rate: 100.0,
            parallel: false,
            remarks: String::new(),
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets quantity, productivity and crew size in one go.
    pub fn with_work(mut self, quantity: f64, productivity: f64, crew_size: u32) -> Self {
        self.quantity = quantity;
        self.productivity = productivity;
        self.crew_size = crew_size;
        self
    }

    pub fn with_operating_rate(mut self, rate_pct: f64) -> Self {
        self.operating_rate_value = rate_pct;
        self
    }

    pub fn with_start_offset(mut self, day: f64) -> Self {
        self.start_offset = Some(day);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether the inverse solvers have enough data to work with.
    pub fn is_solvable(&self) -> bool {
        self.quantity > 0.0 && self.productivity > 0.0 && self.working_days > 0.0
    }

    /// Display label: the name when set, otherwise the ID.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[pymethods]
impl Task {
    #[new]
    #[pyo3(signature = (
        id,
        quantity=0.0,
        productivity=0.0,
        crew_size=1,
        category=String::new(),
        name=String::new(),
        start_offset=None,
        parallel=false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn py_new(
        id: String,
        quantity: f64,
        productivity: f64,
        crew_size: u32,
        category: String,
        name: String,
        start_offset: Option<f64>,
        parallel: bool,
    ) -> Self {
        let mut task = Task::new(id)
            .with_name(name)
            .with_category(category)
            .with_work(quantity, productivity, crew_size)
            .with_parallel(parallel);
        task.start_offset = start_offset;
        task
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, quantity={}, productivity={}, crew_size={}, calendar_days={})",
            self.id, self.quantity, self.productivity, self.crew_size, self.calendar_days
        )
    }
}

/// Operating rate percentages for one work category under each work-week regime.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatingRate {
    #[pyo3(get, set)]
    pub category: String,
    #[pyo3(get, set)]
    pub pct_5d: f64,
    #[pyo3(get, set)]
    pub pct_6d: f64,
    #[pyo3(get, set)]
    pub pct_7d: f64,
}

#[pymethods]
impl OperatingRate {
    #[new]
    fn new(category: String, pct_5d: f64, pct_6d: f64, pct_7d: f64) -> Self {
        Self {
            category,
            pct_5d,
            pct_6d,
            pct_7d,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "OperatingRate(category={:?}, 5d={}, 6d={}, 7d={})",
            self.category, self.pct_5d, self.pct_6d, self.pct_7d
        )
    }
}

/// A link between two tasks. Not used by the duration math.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Placement annotation attached to a task. Not used by the duration math.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
