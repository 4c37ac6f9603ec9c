//! Candidate moves for shortening a critical task, and their scoring.
//!
//! Two families of moves are tried per task: adding crew and boosting
//! productivity. Each family starts with its smallest step and only escalates
//! when that step yields nothing eligible. Adding people beyond the original
//! crew lowers everyone's productivity through the efficiency decay.

use std::cmp::Ordering;
use std::fmt;

use crate::config::OptimizerConfig;
use crate::critical_path::calculate_critical_path_with_override;
use crate::duration::recompute_with_rate;
use crate::log_debug;
use crate::models::Task;
use crate::overlap;
use crate::solver::{solve_for_crew, solve_for_productivity, MIN_TARGET_DAYS};

use super::log::RejectReason;

const EPS: f64 = 1e-9;

/// Half of the calendar-day rounding step. Productivity hints aim this much
/// below the desired duration so rounding cannot leave them just short.
const ROUNDING_MARGIN_DAYS: f64 = 0.05;

/// Original sizing of a task, captured when a run starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Baseline {
    pub crew_size: u32,
    pub productivity: f64,
}

impl Baseline {
    pub fn of(task: &Task) -> Self {
        Self {
            crew_size: task.crew_size,
            productivity: task.productivity,
        }
    }
}

/// Sizing committed so far for one task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjustment {
    pub crew_size: u32,
    /// Productivity boost over the baseline, in percent.
    pub boost_pct: f64,
}

impl Adjustment {
    pub fn initial(baseline: &Baseline) -> Self {
        Self {
            crew_size: baseline.crew_size,
            boost_pct: 0.0,
        }
    }
}

/// What a candidate changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoveKind {
    Crew { from: u32, to: u32 },
    Productivity { from_pct: f64, to_pct: f64 },
}

impl MoveKind {
    pub fn family(&self) -> &'static str {
        match self {
            MoveKind::Crew { .. } => "crew",
            MoveKind::Productivity { .. } => "productivity",
        }
    }

    pub fn other_family(&self) -> &'static str {
        match self {
            MoveKind::Crew { .. } => "productivity",
            MoveKind::Productivity { .. } => "crew",
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Crew { from, to } => write!(f, "crew {} -> {}", from, to),
            MoveKind::Productivity { from_pct, to_pct } => {
                write!(f, "productivity +{:.1}% -> +{:.1}%", from_pct, to_pct)
            }
        }
    }
}

/// Best eligible move of the other family on the same task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunnerUp {
    pub kind: MoveKind,
    pub score: f64,
}

/// A fully evaluated move on one task.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub index: usize,
    pub kind: MoveKind,
    /// The task as it would look after the move.
    pub task: Task,
    pub adjustment: Adjustment,
    pub efficiency: f64,
    /// Project days saved against the current working copy.
    pub saved_days: f64,
    /// Project duration after the move.
    pub new_total: f64,
    pub crew_delta: f64,
    pub prod_delta: f64,
    pub congestion: f64,
    pub score: f64,
    /// Filled in once the winning move of a task is chosen.
    pub runner_up: Option<RunnerUp>,
}

/// Per-person efficiency for `crew` persons on a task originally sized for
/// `baseline_crew`.
///
/// `1.0` up to the baseline, then `1 - decay * extra`, floored.
pub fn efficiency(crew: u32, baseline_crew: u32, config: &OptimizerConfig) -> f64 {
    if crew <= baseline_crew {
        return 1.0;
    }
    let extra = (crew - baseline_crew) as f64;
    (1.0 - config.decay_per_crew * extra).max(config.efficiency_floor)
}

/// Weighted objective. Higher is better.
///
/// Formula: `saved * w_saved - crew * w_crew - prod * w_prod - congestion * w_congestion`
pub fn score(
    saved_days: f64,
    crew_delta: f64,
    prod_delta: f64,
    congestion: f64,
    config: &OptimizerConfig,
) -> f64 {
    saved_days * config.w_saved
        - crew_delta * config.w_crew
        - prod_delta * config.w_prod
        - congestion * config.w_congestion
}

/// Build the task that results from `adjustment`.
///
/// Productivity is always re-derived from the baseline so boosts and
/// efficiency losses never compound across steps.
pub fn materialize(
    task: &Task,
    baseline: &Baseline,
    adjustment: Adjustment,
    config: &OptimizerConfig,
) -> Task {
    let mut resized = task.clone();
    resized.crew_size = adjustment.crew_size;
    resized.productivity = baseline.productivity
        * (1.0 + adjustment.boost_pct / 100.0)
        * efficiency(adjustment.crew_size, baseline.crew_size, config);

    let mut derived = recompute_with_rate(&resized, task.operating_rate_value);
    overlap::refit_task(&mut derived, task.calendar_days);
    derived
}

/// Order candidates by score, then by days saved.
pub(crate) fn by_score(a: &Candidate, b: &Candidate) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then(a.saved_days.total_cmp(&b.saved_days))
}

struct Trial {
    candidate: Candidate,
    still_critical: bool,
}

/// Shared inputs for evaluating the critical tasks of one iteration.
pub struct Evaluation<'a> {
    pub tasks: &'a [Task],
    pub current_total: f64,
    pub target_days: f64,
    /// Smallest project saving a move must reach to be eligible.
    pub min_saving: f64,
    pub config: &'a OptimizerConfig,
}

impl Evaluation<'_> {
    fn is_eligible(&self, candidate: &Candidate) -> bool {
        candidate.saved_days >= self.min_saving - EPS
    }

    /// Find the best eligible move for `tasks[index]`, or say why there is none.
    pub fn evaluate_task(
        &self,
        index: usize,
        baseline: &Baseline,
        adjustment: Adjustment,
    ) -> Result<Candidate, RejectReason> {
        let task = &self.tasks[index];
        if !task.is_solvable()
            || baseline.productivity <= 0.0
            || baseline.crew_size == 0
            || task.operating_rate_value <= 0.0
        {
            return Err(RejectReason::ConstraintBlocked);
        }

        let crew_cap = baseline.crew_size.saturating_add(self.config.max_crew_delta);
        let crew_capped = adjustment.crew_size >= crew_cap;
        let prod_capped = adjustment.boost_pct >= self.config.max_productivity_pct - EPS;
        if crew_capped && prod_capped {
            return Err(RejectReason::CongestionLimit);
        }

        let gap = self.current_total - self.target_days;
        let desired = (task.calendar_days - gap).max(MIN_TARGET_DAYS);

        let mut trials: Vec<Trial> = Vec::new();
        if !crew_capped {
            self.crew_trials(index, baseline, adjustment, crew_cap, desired, &mut trials);
        }
        if !prod_capped {
            self.productivity_trials(index, baseline, adjustment, desired, &mut trials);
        }

        let best_of = |family: Option<&'static str>| {
            trials
                .iter()
                .map(|t| &t.candidate)
                .filter(|c| self.is_eligible(c))
                .filter(|c| family.map_or(true, |f| c.kind.family() == f))
                .max_by(|a, b| by_score(a, b))
        };
        if let Some(best) = best_of(None) {
            let mut chosen = best.clone();
            chosen.runner_up = best_of(Some(best.kind.other_family())).map(|c| RunnerUp {
                kind: c.kind,
                score: c.score,
            });
            return Ok(chosen);
        }

        let Some(best_saving) = trials
            .iter()
            .map(|t| t.candidate.saved_days)
            .max_by(|a, b| a.total_cmp(b))
        else {
            return Err(if crew_capped {
                RejectReason::CongestionLimit
            } else {
                RejectReason::ProductivityCap
            });
        };

        if best_saving <= EPS && trials.iter().any(|t| !t.still_critical) {
            Err(RejectReason::NotCriticalAfterRecalc)
        } else if crew_capped {
            Err(RejectReason::CongestionLimit)
        } else if prod_capped {
            Err(RejectReason::ProductivityCap)
        } else {
            Err(RejectReason::MicroSaving)
        }
    }

    /// Crew +1 first, then the larger steps up to the crew ceiling.
    fn crew_trials(
        &self,
        index: usize,
        baseline: &Baseline,
        adjustment: Adjustment,
        crew_cap: u32,
        desired: f64,
        trials: &mut Vec<Trial>,
    ) {
        // Crew that closes the gap at today's per-person productivity.
        let needed = solve_for_crew(&self.tasks[index], desired, None).crew_size;
        let tiers: [Vec<u32>; 2] = [vec![1], (2..=self.config.max_crew_delta).collect()];

        for (tier_index, tier) in tiers.iter().enumerate() {
            if tier_index > 0 && trials.iter().any(|t| self.is_eligible(&t.candidate)) {
                break;
            }
            for &step in tier {
                let to = adjustment.crew_size.saturating_add(step);
                if to > crew_cap {
                    break;
                }
                let next = Adjustment {
                    crew_size: to,
                    boost_pct: adjustment.boost_pct,
                };
                let congestion =
                    (to - baseline.crew_size.min(to)) as f64 / baseline.crew_size.max(1) as f64;
                let trial = self.trial(
                    index,
                    baseline,
                    next,
                    MoveKind::Crew {
                        from: adjustment.crew_size,
                        to,
                    },
                    step as f64,
                    0.0,
                    congestion,
                );
                let closes = to >= needed && self.is_eligible(&trial.candidate);
                trials.push(trial);
                if closes {
                    return;
                }
            }
        }
    }

    /// One productivity step first, then its multiples up to the boost ceiling.
    ///
    /// When the exact productivity that closes the gap lies below a level, the
    /// exact boost is used instead of overshooting.
    fn productivity_trials(
        &self,
        index: usize,
        baseline: &Baseline,
        adjustment: Adjustment,
        desired: f64,
        trials: &mut Vec<Trial>,
    ) {
        let config = self.config;
        let task = &self.tasks[index];
        let effective_base = baseline.productivity
            * efficiency(adjustment.crew_size, baseline.crew_size, config);
        let required = solve_for_productivity(
            task,
            (desired - ROUNDING_MARGIN_DAYS).max(MIN_TARGET_DAYS),
        )
        .productivity;
        let required_boost = (required / effective_base - 1.0) * 100.0;

        let mut levels: Vec<f64> = Vec::new();
        for k in 1u32.. {
            let level = (adjustment.boost_pct + config.productivity_step_pct * k as f64)
                .min(config.max_productivity_pct);
            levels.push(level);
            if level >= config.max_productivity_pct - EPS {
                break;
            }
        }
        let (first, rest) = levels.split_at(1);

        // Crew trials may already be in `trials`; escalation only looks at ours.
        let own = trials.len();
        for (tier_index, tier) in [first, rest].into_iter().enumerate() {
            if tier_index > 0 && trials[own..].iter().any(|t| self.is_eligible(&t.candidate)) {
                break;
            }
            for &level in tier {
                let exact = required_boost.is_finite()
                    && required_boost > adjustment.boost_pct + EPS
                    && required_boost < level;
                let to_pct = if exact { required_boost } else { level };
                let next = Adjustment {
                    crew_size: adjustment.crew_size,
                    boost_pct: to_pct,
                };
                let trial = self.trial(
                    index,
                    baseline,
                    next,
                    MoveKind::Productivity {
                        from_pct: adjustment.boost_pct,
                        to_pct,
                    },
                    0.0,
                    (to_pct - adjustment.boost_pct) / config.productivity_step_pct,
                    0.0,
                );
                let closes = exact && self.is_eligible(&trial.candidate);
                trials.push(trial);
                if closes {
                    return;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn trial(
        &self,
        index: usize,
        baseline: &Baseline,
        adjustment: Adjustment,
        kind: MoveKind,
        crew_delta: f64,
        prod_delta: f64,
        congestion: f64,
    ) -> Trial {
        let task = materialize(&self.tasks[index], baseline, adjustment, self.config);
        let result = calculate_critical_path_with_override(self.tasks, index, &task);
        let saved_days = self.current_total - result.total_days;
        let score = score(saved_days, crew_delta, prod_delta, congestion, self.config);
        let still_critical = result
            .timings
            .get(index)
            .map(|t| t.critical)
            .unwrap_or(false);

        log_debug!(
            self.config.verbosity,
            "  candidate {} {:?}: {:.1} -> {:.1} days, saved {:.2}, score {:.3}",
            task.id,
            kind,
            self.tasks[index].calendar_days,
            task.calendar_days,
            saved_days,
            score
        );

        Trial {
            candidate: Candidate {
                index,
                kind,
                efficiency: efficiency(adjustment.crew_size, baseline.crew_size, self.config),
                task,
                adjustment,
                saved_days,
                new_total: result.total_days,
                crew_delta,
                prod_delta,
                congestion,
                score,
                runner_up: None,
            },
            still_critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived(id: &str, quantity: f64, productivity: f64, crew: u32) -> Task {
        recompute_with_rate(&Task::new(id).with_work(quantity, productivity, crew), 100.0)
    }

    fn evaluation<'a>(
        tasks: &'a [Task],
        target: f64,
        config: &'a OptimizerConfig,
    ) -> Evaluation<'a> {
        let current_total = crate::critical_path::calculate_critical_path(tasks).total_days;
        Evaluation {
            tasks,
            current_total,
            target_days: target,
            min_saving: (0.002 * current_total).max(0.05),
            config,
        }
    }

    #[test]
    fn test_efficiency_decay() {
        let config = OptimizerConfig::default();
        assert_eq!(efficiency(1, 2, &config), 1.0);
        assert_eq!(efficiency(2, 2, &config), 1.0);
        assert!((efficiency(3, 2, &config) - 0.95).abs() < 1e-9);
        assert!((efficiency(5, 2, &config) - 0.85).abs() < 1e-9);
        assert!((efficiency(40, 2, &config) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_score_weights() {
        let config = OptimizerConfig::default();
        // 5 - 0.4 - 0 - 0.8 * 0.5
        assert!((score(5.0, 1.0, 0.0, 0.5, &config) - 4.2).abs() < 1e-9);
        // 2 - 0 - 0.2 * 2 - 0
        assert!((score(2.0, 0.0, 2.0, 0.0, &config) - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_materialize_applies_decay_and_boost() {
        let config = OptimizerConfig::default();
        let task = derived("t", 480.0, 10.0, 2);
        let baseline = Baseline::of(&task);

        let more_crew = materialize(
            &task,
            &baseline,
            Adjustment {
                crew_size: 3,
                boost_pct: 0.0,
            },
            &config,
        );
        assert!((more_crew.productivity - 9.5).abs() < 1e-9);
        assert!((more_crew.daily_production - 28.5).abs() < 1e-9);
        assert!((more_crew.calendar_days - 16.8).abs() < 1e-9);

        let boosted = materialize(
            &task,
            &baseline,
            Adjustment {
                crew_size: 2,
                boost_pct: 5.0,
            },
            &config,
        );
        assert!((boosted.productivity - 10.5).abs() < 1e-9);
        assert!((boosted.calendar_days - 22.9).abs() < 1e-9);
    }

    #[test]
    fn test_best_move_for_single_task() {
        let config = OptimizerConfig::default();
        let tasks = vec![derived("t", 480.0, 10.0, 2)];
        let eval = evaluation(&tasks, 20.0, &config);
        let baseline = Baseline::of(&tasks[0]);

        let best = eval
            .evaluate_task(0, &baseline, Adjustment::initial(&baseline))
            .unwrap();
        assert!(best.new_total <= 20.0);
        assert!(best.saved_days >= eval.min_saving);
        match best.kind {
            MoveKind::Crew { from, to } => {
                assert_eq!(from, 2);
                assert!(to <= 5);
            }
            MoveKind::Productivity { from_pct, to_pct } => {
                assert_eq!(from_pct, 0.0);
                assert!(to_pct <= 15.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_exact_productivity_boost_avoids_overshoot() {
        // Only productivity may move; 24 -> 23 days needs about a 4.6% boost.
        let config = OptimizerConfig {
            max_crew_delta: 0,
            ..OptimizerConfig::default()
        };
        let tasks = vec![derived("t", 480.0, 10.0, 2)];
        let eval = evaluation(&tasks, 23.0, &config);
        let baseline = Baseline::of(&tasks[0]);

        let best = eval
            .evaluate_task(0, &baseline, Adjustment::initial(&baseline))
            .unwrap();
        match best.kind {
            MoveKind::Productivity { to_pct, .. } => {
                assert!(to_pct > 0.0 && to_pct < 5.0, "boost was {to_pct}");
            }
            other => panic!("unexpected move {other:?}"),
        }
        assert!(best.new_total <= 23.0 + 1e-9);
    }

    #[test]
    fn test_unsolvable_task_is_blocked() {
        let config = OptimizerConfig::default();
        let tasks = vec![derived("t", 0.0, 10.0, 2), derived("u", 100.0, 10.0, 1)];
        let eval = evaluation(&tasks, 5.0, &config);
        let baseline = Baseline::of(&tasks[0]);
        let result = eval.evaluate_task(0, &baseline, Adjustment::initial(&baseline));
        assert_eq!(result.unwrap_err(), RejectReason::ConstraintBlocked);
    }

    #[test]
    fn test_fully_capped_task_hits_congestion_limit() {
        let config = OptimizerConfig::default();
        let tasks = vec![derived("t", 480.0, 10.0, 2)];
        let eval = evaluation(&tasks, 5.0, &config);
        let baseline = Baseline::of(&tasks[0]);
        let capped = Adjustment {
            crew_size: 5,
            boost_pct: 15.0,
        };
        assert_eq!(
            eval.evaluate_task(0, &baseline, capped).unwrap_err(),
            RejectReason::CongestionLimit
        );
    }

    #[test]
    fn test_task_hidden_behind_longer_neighbor() {
        // b has an explicit start and physically ends at day 30, past a's end.
        // Shortening a cannot move the project end.
        let config = OptimizerConfig::default();
        let a = derived("a", 200.0, 10.0, 1);
        let b = derived("b", 10.0, 1.0, 1).with_start_offset(20.0);
        let tasks = vec![a, b.with_parallel(true)];
        let eval = evaluation(&tasks, 10.0, &config);
        let baseline = Baseline::of(&tasks[0]);

        let result = eval.evaluate_task(0, &baseline, Adjustment::initial(&baseline));
        assert_eq!(result.unwrap_err(), RejectReason::MicroSaving);
    }

    #[test]
    fn test_boosted_task_without_crew_benefit_hits_productivity_cap() {
        // Same layout as above, with the boost already at its ceiling. Crew
        // moves are still open but cannot move the project end.
        let config = OptimizerConfig::default();
        let a = derived("a", 200.0, 10.0, 1);
        let b = derived("b", 10.0, 1.0, 1).with_start_offset(20.0);
        let tasks = vec![a, b.with_parallel(true)];
        let eval = evaluation(&tasks, 10.0, &config);
        let baseline = Baseline::of(&tasks[0]);
        let boosted = Adjustment {
            crew_size: baseline.crew_size,
            boost_pct: 15.0,
        };

        let result = eval.evaluate_task(0, &baseline, boosted);
        assert_eq!(result.unwrap_err(), RejectReason::ProductivityCap);
        assert_eq!(RejectReason::ProductivityCap.code(), "PRODUCTIVITY_CAP");
    }

    #[test]
    fn test_productivity_escalates_alongside_eligible_crew_move() {
        // Crew +1 is eligible but priced out; +5% alone falls short of the
        // raised threshold, so the larger boosts must still be tried.
        let config = OptimizerConfig {
            w_crew: 10.0,
            ..OptimizerConfig::default()
        };
        let tasks = vec![derived("t", 480.0, 10.0, 2)];
        let mut eval = evaluation(&tasks, 20.0, &config);
        eval.min_saving = 1.5;
        let baseline = Baseline::of(&tasks[0]);

        let best = eval
            .evaluate_task(0, &baseline, Adjustment::initial(&baseline))
            .unwrap();
        match best.kind {
            MoveKind::Productivity { to_pct, .. } => {
                assert!(to_pct > 5.0 + 1e-9, "boost was {to_pct}");
            }
            other => panic!("unexpected move {other:?}"),
        }
        let runner_up = best.runner_up.unwrap();
        assert_eq!(runner_up.kind.family(), "crew");
        assert!(runner_up.score < best.score);
    }

    #[test]
    fn test_task_dropping_off_critical_path() {
        // b overlaps a from day 0 and ends at 12; c is a parallel task that
        // also ends at 12. Shortening b hands the project end to c.
        let config = OptimizerConfig::default();
        let tasks = vec![
            derived("a", 100.0, 10.0, 1),
            derived("b", 120.0, 10.0, 1).with_start_offset(0.0),
            derived("c", 120.0, 10.0, 1)
                .with_start_offset(0.0)
                .with_parallel(true),
        ];
        let eval = evaluation(&tasks, 8.0, &config);
        assert!((eval.current_total - 12.0).abs() < 1e-9);
        let baseline = Baseline::of(&tasks[1]);

        let result = eval.evaluate_task(1, &baseline, Adjustment::initial(&baseline));
        assert_eq!(result.unwrap_err(), RejectReason::NotCriticalAfterRecalc);
    }

    #[test]
    fn test_tiny_saving_is_micro() {
        // Large project: the 0.2% threshold outweighs a tiny task's best move.
        let config = OptimizerConfig::default();
        let tasks = vec![derived("big", 10_000.0, 10.0, 1), derived("tiny", 1.0, 10.0, 1)];
        let eval = evaluation(&tasks, 900.0, &config);
        assert!(eval.min_saving > 1.0);
        let baseline = Baseline::of(&tasks[1]);
        let result = eval.evaluate_task(1, &baseline, Adjustment::initial(&baseline));
        assert_eq!(result.unwrap_err(), RejectReason::MicroSaving);
    }
}
