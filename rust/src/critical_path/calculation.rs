//! Critical path calculation for a linear task chain with overlaps.
//!
//! Tasks are walked once in schedule order while tracking the running
//! critical-path end. Each task starts where the running end leaves it, minus
//! its front overlap, unless it carries an explicit start offset. Only the
//! part of a task between its front and back overlaps advances the running
//! end.

use crate::models::Task;

use super::types::{CriticalPathResult, TaskTiming};

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Calculate project duration and the critical task set for `tasks`.
pub fn calculate_critical_path(tasks: &[Task]) -> CriticalPathResult {
    walk_chain(tasks.iter())
}

/// Calculate the critical path as if `tasks[index]` were replaced by `replacement`.
///
/// Used to evaluate candidate moves without cloning the task list.
pub fn calculate_critical_path_with_override(
    tasks: &[Task],
    index: usize,
    replacement: &Task,
) -> CriticalPathResult {
    walk_chain(
        tasks
            .iter()
            .enumerate()
            .map(|(i, t)| if i == index { replacement } else { t }),
    )
}

fn walk_chain<'a>(tasks: impl Iterator<Item = &'a Task>) -> CriticalPathResult {
    let mut timings: Vec<TaskTiming> = Vec::new();
    let mut running_end = 0.0_f64;
    let mut total_days = 0.0_f64;

    for (index, task) in tasks.enumerate() {
        let duration = non_negative(task.calendar_days);
        let front = non_negative(task.front_parallel_days).min(duration);
        let back = non_negative(task.back_parallel_days).min(duration);

        let start = match task.start_offset.filter(|s| s.is_finite()) {
            Some(offset) => offset.max(0.0),
            None if index > 0 => (running_end - front).max(0.0),
            None => 0.0,
        };
        let end = start + duration;

        let red_start = (start + front).clamp(start, end);
        let red_end = (end - back).clamp(start, end);

        let previous_end = running_end;
        running_end = running_end.max(red_end);
        total_days = total_days.max(end);

        // A task enclosed by its predecessor ends before the running end and
        // never qualifies here.
        let critical = red_end >= previous_end && !task.parallel;

        timings.push(TaskTiming {
            task_id: task.id.clone(),
            index,
            start,
            end,
            red_start,
            red_end,
            critical,
        });
    }

    CriticalPathResult::new(timings, total_days, running_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, duration: f64) -> Task {
        let mut task = Task::new(id);
        task.calendar_days = duration;
        task
    }

    fn with_overlap(mut task: Task, front: f64, back: f64) -> Task {
        task.front_parallel_days = front;
        task.back_parallel_days = back;
        task
    }

    #[test]
    fn test_single_task_is_its_own_duration() {
        let result = calculate_critical_path(&[make_task("a", 24.0)]);
        assert!((result.total_days - 24.0).abs() < 1e-9);
        assert_eq!(result.critical_task_ids, vec!["a"]);
    }

    #[test]
    fn test_sequential_chain() {
        let result = calculate_critical_path(&[make_task("a", 10.0), make_task("b", 6.0)]);
        assert!((result.total_days - 16.0).abs() < 1e-9);
        assert_eq!(result.critical_task_ids, vec!["a", "b"]);

        let b = result.timing("b").unwrap();
        assert!((b.start - 10.0).abs() < 1e-9);
        assert!((b.end - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_front_overlap_pulls_next_task_forward() {
        let tasks = vec![make_task("a", 10.0), with_overlap(make_task("b", 6.0), 4.0, 0.0)];
        let result = calculate_critical_path(&tasks);

        let b = result.timing("b").unwrap();
        assert!((b.start - 6.0).abs() < 1e-9);
        assert!((b.end - 12.0).abs() < 1e-9);
        assert!((b.red_start - 10.0).abs() < 1e-9);
        assert!((result.total_days - 12.0).abs() < 1e-9);
        assert_eq!(result.critical_task_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_back_overlap_can_outlast_critical_end() {
        // The last task's tail runs in parallel, but it still physically ends at 16.
        let tasks = vec![make_task("a", 10.0), with_overlap(make_task("b", 6.0), 0.0, 3.0)];
        let result = calculate_critical_path(&tasks);
        assert!((result.critical_end - 13.0).abs() < 1e-9);
        assert!((result.total_days - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_enclosed_task_is_not_critical() {
        // b runs from day 2 to day 5, inside a's window.
        let tasks = vec![
            make_task("a", 10.0),
            make_task("b", 3.0).with_start_offset(2.0),
            make_task("c", 5.0),
        ];
        let result = calculate_critical_path(&tasks);

        assert!(!result.is_critical("b"));
        assert!((result.timing("c").unwrap().start - 10.0).abs() < 1e-9);
        assert!((result.total_days - 15.0).abs() < 1e-9);
        assert_eq!(result.critical_task_ids, vec!["a", "c"]);
    }

    #[test]
    fn test_parallel_flag_excludes_task() {
        let tasks = vec![make_task("a", 10.0), make_task("b", 6.0).with_parallel(true)];
        let result = calculate_critical_path(&tasks);
        assert_eq!(result.critical_task_ids, vec!["a"]);
        assert!((result.total_days - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_start_offset() {
        let tasks = vec![
            make_task("a", 10.0),
            make_task("b", 4.0).with_start_offset(20.0),
            make_task("c", 2.0),
        ];
        let result = calculate_critical_path(&tasks);
        assert!((result.timing("b").unwrap().start - 20.0).abs() < 1e-9);
        assert!((result.timing("c").unwrap().start - 24.0).abs() < 1e-9);
        assert!((result.total_days - 26.0).abs() < 1e-9);
    }

    #[test]
    fn test_front_overlap_never_starts_before_zero() {
        let tasks = vec![make_task("a", 2.0), with_overlap(make_task("b", 10.0), 5.0, 0.0)];
        let result = calculate_critical_path(&tasks);
        assert_eq!(result.timing("b").unwrap().start, 0.0);
        assert!((result.total_days - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_garbage_numbers_do_not_panic() {
        let mut broken = make_task("a", f64::NAN);
        broken.front_parallel_days = f64::INFINITY;
        broken.start_offset = Some(f64::NAN);
        let result = calculate_critical_path(&[broken, make_task("b", -3.0)]);
        assert_eq!(result.total_days, 0.0);
    }

    #[test]
    fn test_override_matches_substitution() {
        let tasks = vec![make_task("a", 10.0), make_task("b", 6.0)];
        let shorter = make_task("a", 7.0);
        let via_override = calculate_critical_path_with_override(&tasks, 0, &shorter);
        let via_copy = calculate_critical_path(&[shorter.clone(), tasks[1].clone()]);
        assert_eq!(via_override.timings, via_copy.timings);
        assert!((via_override.total_days - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_chain() {
        let result = calculate_critical_path(&[]);
        assert_eq!(result.total_days, 0.0);
        assert!(result.critical_task_ids.is_empty());
    }
}
