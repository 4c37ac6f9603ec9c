//! Inverse solvers: back-compute crew size or productivity from a target duration.
//!
//! Both solvers derive the working days available inside the target calendar
//! duration (`target * operating_rate / 100`), work out the daily production
//! that finishes the quantity in that time, and then run the duration model
//! forward again so the returned task reflects what is actually achievable.
//!
//! Tasks without enough data (no quantity, no productivity, no working days
//! or no operating rate) come back with only `calendar_days` set to the target.

use crate::duration::recompute_with_rate;
use crate::models::Task;

/// Shortest duration a solver will aim for, in days.
pub const MIN_TARGET_DAYS: f64 = 0.5;

/// Slack allowed before rounding a crew size up, so float noise such as
/// 2.0000000001 does not add a person.
const CREW_ROUNDING_EPS: f64 = 1e-9;

fn clamp_target(target_days: f64) -> f64 {
    if target_days.is_finite() {
        target_days.max(MIN_TARGET_DAYS)
    } else {
        MIN_TARGET_DAYS
    }
}

fn unsolved(task: &Task, target_days: f64) -> Task {
    let mut unchanged = task.clone();
    unchanged.calendar_days = target_days;
    unchanged
}

/// Working days available in `target_days` at the task's operating rate.
fn target_working_days(task: &Task, target_days: f64) -> Option<f64> {
    let rate = task.operating_rate_value;
    if !(rate.is_finite() && rate > 0.0) {
        return None;
    }
    Some(target_days * rate / 100.0)
}

/// Crew size needed to finish `task` in `target_days`.
///
/// `base_productivity`, when given, replaces the task's productivity before
/// solving. The crew is rounded up, so the achievable duration can be a bit
/// shorter than requested.
pub fn solve_for_crew(task: &Task, target_days: f64, base_productivity: Option<f64>) -> Task {
    let target = clamp_target(target_days);
    let productivity = base_productivity
        .filter(|p| p.is_finite())
        .unwrap_or(task.productivity);

    if task.quantity <= 0.0 || productivity <= 0.0 || task.working_days <= 0.0 {
        return unsolved(task, target);
    }
    let Some(working) = target_working_days(task, target) else {
        return unsolved(task, target);
    };

    let required_daily = task.quantity / working;
    let exact_crew = required_daily / productivity;
    let crew = (exact_crew - CREW_ROUNDING_EPS).ceil().max(1.0);

    let mut solved = task.clone();
    solved.productivity = productivity;
    solved.crew_size = if crew >= u32::MAX as f64 {
        u32::MAX
    } else {
        crew as u32
    };
    recompute_with_rate(&solved, task.operating_rate_value)
}

/// Productivity needed to finish `task` in `target_days` with its current crew.
///
/// Productivity is continuous, so it is not rounded; the forward recompute
/// lands on the target within the duration model's rounding.
pub fn solve_for_productivity(task: &Task, target_days: f64) -> Task {
    let target = clamp_target(target_days);

    if task.quantity <= 0.0 || task.productivity <= 0.0 || task.working_days <= 0.0 {
        return unsolved(task, target);
    }
    if task.crew_size == 0 {
        return unsolved(task, target);
    }
    let Some(working) = target_working_days(task, target) else {
        return unsolved(task, target);
    };

    let required_daily = task.quantity / working;
    let mut solved = task.clone();
    solved.productivity = required_daily / task.crew_size as f64;
    recompute_with_rate(&solved, task.operating_rate_value)
}
