//! Types for the sequential critical path calculation.

use pyo3::prelude::*;
use rustc_hash::FxHashSet;

/// Per-task timing produced by walking the task chain.
///
/// All values are day indices from the project start.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskTiming {
    /// Task ID.
    #[pyo3(get)]
    pub task_id: String,
    /// Position of the task in the schedule.
    #[pyo3(get)]
    pub index: usize,
    /// Physical start day.
    #[pyo3(get)]
    pub start: f64,
    /// Physical end day (`start + calendar_days`).
    #[pyo3(get)]
    pub end: f64,
    /// Start of the window that counts toward the critical path.
    #[pyo3(get)]
    pub red_start: f64,
    /// End of the window that counts toward the critical path.
    #[pyo3(get)]
    pub red_end: f64,
    /// Whether this task currently drives the project duration.
    #[pyo3(get)]
    pub critical: bool,
}

#[pymethods]
impl TaskTiming {
    fn __repr__(&self) -> String {
        format!(
            "TaskTiming(task_id={:?}, start={}, end={}, critical={})",
            self.task_id, self.start, self.end, self.critical
        )
    }
}

/// Result of walking a task chain.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct CriticalPathResult {
    /// Timings in schedule order.
    #[pyo3(get)]
    pub timings: Vec<TaskTiming>,
    /// IDs of critical tasks, in schedule order.
    #[pyo3(get)]
    pub critical_task_ids: Vec<String>,
    /// Project duration: latest physical end over all tasks.
    #[pyo3(get)]
    pub total_days: f64,
    /// Final critical-path end (may be earlier than `total_days`).
    #[pyo3(get)]
    pub critical_end: f64,
    critical_set: FxHashSet<String>,
}

impl CriticalPathResult {
    pub(crate) fn new(timings: Vec<TaskTiming>, total_days: f64, critical_end: f64) -> Self {
        let critical_task_ids: Vec<String> = timings
            .iter()
            .filter(|t| t.critical)
            .map(|t| t.task_id.clone())
            .collect();
        let critical_set = critical_task_ids.iter().cloned().collect();
        Self {
            timings,
            critical_task_ids,
            total_days,
            critical_end,
            critical_set,
        }
    }

    pub fn is_critical(&self, task_id: &str) -> bool {
        self.critical_set.contains(task_id)
    }

    /// Positions of critical tasks in schedule order.
    pub fn critical_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.timings.iter().filter(|t| t.critical).map(|t| t.index)
    }

    pub fn timing(&self, task_id: &str) -> Option<&TaskTiming> {
        self.timings.iter().find(|t| t.task_id == task_id)
    }
}

#[pymethods]
impl CriticalPathResult {
    #[pyo3(name = "is_critical")]
    fn py_is_critical(&self, task_id: &str) -> bool {
        self.is_critical(task_id)
    }

    fn __repr__(&self) -> String {
        format!(
            "CriticalPathResult(total_days={}, critical={:?})",
            self.total_days, self.critical_task_ids
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(id: &str, index: usize, critical: bool) -> TaskTiming {
        TaskTiming {
            task_id: id.to_string(),
            index,
            critical,
            ..TaskTiming::default()
        }
    }

    #[test]
    fn test_critical_ids_follow_schedule_order() {
        let result = CriticalPathResult::new(
            vec![timing("b", 0, true), timing("a", 1, false), timing("c", 2, true)],
            12.0,
            12.0,
        );
        assert_eq!(result.critical_task_ids, vec!["b", "c"]);
        assert_eq!(result.critical_indices().collect::<Vec<_>>(), vec![0, 2]);
        assert!(result.is_critical("c"));
        assert!(!result.is_critical("a"));
        assert_eq!(result.timing("a").map(|t| t.index), Some(1));
    }
}
