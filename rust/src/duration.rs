//! Duration model: quantity, productivity, crew and operating rate to calendar time.
//!
//! ```text
//! daily_production = productivity * crew_size
//! working_days     = quantity / daily_production
//! calendar_days    = working_days / (operating_rate / 100)
//! calendar_months  = calendar_days / 30
//! ```
//!
//! Every derived value is rounded to a fixed precision so that recomputing an
//! already-derived task reproduces the same numbers.

use rustc_hash::FxHashMap;

use crate::config::WorkWeek;
use crate::models::{OperatingRate, Task};

/// Decimal places kept for rates and daily production.
pub const RATE_DECIMALS: i32 = 3;
/// Decimal places kept for working days.
pub const WORKING_DAYS_DECIMALS: i32 = 2;
/// Decimal places kept for calendar days and months.
pub const CALENDAR_DECIMALS: i32 = 1;

const DAYS_PER_MONTH: f64 = 30.0;
const FULL_RATE_PCT: f64 = 100.0;

/// Round to a fixed number of decimals. Non-finite values become 0.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Operating rates keyed by work category.
#[derive(Clone, Debug, Default)]
pub struct OperatingRateTable {
    rates: FxHashMap<String, OperatingRate>,
}

impl OperatingRateTable {
    /// Build the table. Later records win when a category repeats.
    pub fn new(records: impl IntoIterator<Item = OperatingRate>) -> Self {
        let rates = records
            .into_iter()
            .map(|r| (r.category.clone(), r))
            .collect();
        Self { rates }
    }

    /// Percentage for `category` under `work_week`, if the category is known.
    pub fn lookup(&self, category: &str, work_week: WorkWeek) -> Option<f64> {
        self.rates.get(category).map(|r| match work_week {
            WorkWeek::FiveDay => r.pct_5d,
            WorkWeek::SixDay => r.pct_6d,
            WorkWeek::SevenDay => r.pct_7d,
        })
    }

    /// Records in category order.
    pub fn records(&self) -> Vec<OperatingRate> {
        let mut records: Vec<OperatingRate> = self.rates.values().cloned().collect();
        records.sort_by(|a, b| a.category.cmp(&b.category));
        records
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Pick the operating rate for a task.
///
/// Table entry for the task's category first, then the rate stored on the
/// task by a previous recompute, then 100%.
pub fn resolve_operating_rate(task: &Task, table: &OperatingRateTable, work_week: WorkWeek) -> f64 {
    let rate = table
        .lookup(&task.category, work_week)
        .filter(|r| r.is_finite())
        .unwrap_or(task.operating_rate_value);
    if rate.is_finite() && rate > 0.0 {
        rate.min(FULL_RATE_PCT)
    } else if rate == 0.0 {
        0.0
    } else {
        FULL_RATE_PCT
    }
}

/// Recompute a task's derived fields against an operating-rate table.
pub fn recompute(task: &Task, table: &OperatingRateTable, work_week: WorkWeek) -> Task {
    let rate = resolve_operating_rate(task, table, work_week);
    recompute_with_rate(task, rate)
}

/// Recompute a task's derived fields with an already resolved operating rate.
///
/// A zero daily production or zero rate yields zero durations; this marks an
/// unconfigured task rather than an error.
pub fn recompute_with_rate(task: &Task, rate_pct: f64) -> Task {
    let mut derived = task.clone();
    let rate = if rate_pct.is_finite() {
        round_to(rate_pct.clamp(0.0, FULL_RATE_PCT), RATE_DECIMALS)
    } else {
        FULL_RATE_PCT
    };

    let daily = round_to(task.productivity * task.crew_size as f64, RATE_DECIMALS);
    let working = if daily > 0.0 && task.quantity > 0.0 {
        round_to(task.quantity / daily, WORKING_DAYS_DECIMALS)
    } else {
        0.0
    };
    let calendar = if rate > 0.0 {
        round_to(working / (rate / FULL_RATE_PCT), CALENDAR_DECIMALS)
    } else {
        0.0
    };

    derived.operating_rate_value = rate;
    derived.daily_production = daily;
    derived.working_days = working;
    derived.calendar_days = calendar;
    derived.calendar_months = round_to(calendar / DAYS_PER_MONTH, CALENDAR_DECIMALS);
    derived
}
