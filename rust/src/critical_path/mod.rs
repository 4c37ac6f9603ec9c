//! Critical path calculation for sequential work schedules.
//!
//! Schedules here are linear chains: each task follows its predecessor unless
//! it declares an explicit start, and front/back overlaps let neighbors run
//! partly in parallel. A single pass yields the project duration and the
//! tasks that currently drive it.

mod calculation;
mod types;

pub use calculation::{calculate_critical_path, calculate_critical_path_with_override};
pub use types::{CriticalPathResult, TaskTiming};
