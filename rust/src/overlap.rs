//! Overlap model: parallel segments and their front/back/application-rate projections.
//!
//! The segment list is the authoritative description of when a task runs
//! alongside its neighbors. Front and back lengths are a projection that only
//! captures segments touching the start or the end of the task, and the
//! application rate summarizes how much of the task still counts toward the
//! critical path.

use crate::duration::{round_to, RATE_DECIMALS};
use crate::models::{ParallelSegment, SegmentAnchor, Task};

/// Tolerance for deciding that a segment touches a task boundary.
const EDGE_EPS: f64 = 1e-9;

/// Projection of a segment list onto scalar fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapMetadata {
    pub front_parallel_days: f64,
    pub back_parallel_days: f64,
    /// Total parallel days across all segments.
    pub parallel_days: f64,
    pub application_rate: f64,
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

/// Clip segments to `[0, duration]`, drop empty ones, sort, and merge overlaps.
///
/// Segments that merely touch are kept apart so a front and a back segment
/// that meet in the middle still project back onto their own lengths.
pub fn normalize_segments(duration: f64, segments: &[ParallelSegment]) -> Vec<ParallelSegment> {
    let duration = sanitize_duration(duration);
    let mut clipped: Vec<ParallelSegment> = segments
        .iter()
        .filter(|s| s.start.is_finite() && s.end.is_finite())
        .map(|s| {
            let (lo, hi) = if s.start <= s.end {
                (s.start, s.end)
            } else {
                (s.end, s.start)
            };
            ParallelSegment::anchored(lo.clamp(0.0, duration), hi.clamp(0.0, duration), s.anchor)
        })
        .filter(|s| s.length() > EDGE_EPS)
        .collect();
    clipped.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));

    let mut merged: Vec<ParallelSegment> = Vec::with_capacity(clipped.len());
    for segment in clipped {
        match merged.last_mut() {
            Some(last) if segment.start < last.end - EDGE_EPS => {
                last.end = last.end.max(segment.end);
                if last.anchor == SegmentAnchor::Free {
                    last.anchor = segment.anchor;
                }
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// Project a segment list onto front/back lengths and an application rate.
///
/// A segment spanning the whole task counts as front overlap only when it was
/// placed as one; otherwise it is back overlap, in line with the right-aligned
/// application-rate convention.
pub fn segments_to_metadata(duration: f64, segments: &[ParallelSegment]) -> OverlapMetadata {
    let duration = sanitize_duration(duration);
    let merged = normalize_segments(duration, segments);
    if duration == 0.0 {
        return OverlapMetadata {
            front_parallel_days: 0.0,
            back_parallel_days: 0.0,
            parallel_days: 0.0,
            application_rate: 100.0,
        };
    }

    let touches_start = |s: &ParallelSegment| s.start <= EDGE_EPS;
    let touches_end = |s: &ParallelSegment| s.end >= duration - EDGE_EPS;
    let is_front = |s: &ParallelSegment| {
        touches_start(s) && (!touches_end(s) || s.anchor == SegmentAnchor::Front)
    };

    let back = merged
        .last()
        .filter(|s| touches_end(s) && !is_front(s))
        .map(ParallelSegment::length)
        .unwrap_or(0.0);
    let front = merged
        .first()
        .filter(|s| is_front(s))
        .map(ParallelSegment::length)
        .unwrap_or(0.0);

    let parallel_days: f64 = merged.iter().map(ParallelSegment::length).sum();
    let application_rate = round_to(
        (100.0 * (duration - parallel_days) / duration).clamp(0.0, 100.0),
        RATE_DECIMALS,
    );

    OverlapMetadata {
        front_parallel_days: front,
        back_parallel_days: back,
        parallel_days,
        application_rate,
    }
}

/// Build at most two segments, `[0, front]` and `[duration - back, duration]`.
///
/// Both lengths are clamped to the duration, and `back` is shortened further
/// when `front + back` would exceed it.
pub fn front_back_to_segments(duration: f64, front: f64, back: f64) -> Vec<ParallelSegment> {
    let duration = sanitize_duration(duration);
    let front = if front.is_finite() {
        front.clamp(0.0, duration)
    } else {
        0.0
    };
    let back = if back.is_finite() {
        back.clamp(0.0, duration - front)
    } else {
        0.0
    };

    let mut segments = Vec::with_capacity(2);
    if front > EDGE_EPS {
        segments.push(ParallelSegment::anchored(0.0, front, SegmentAnchor::Front));
    }
    if back > EDGE_EPS {
        segments.push(ParallelSegment::anchored(
            duration - back,
            duration,
            SegmentAnchor::Back,
        ));
    }
    segments
}

/// Segments for a directly entered application rate.
///
/// Always a single trailing segment: entering 80% means the last 20% of the
/// task overlaps with the next one, whatever the previous segments were.
pub fn segments_for_application_rate(duration: f64, rate_pct: f64) -> Vec<ParallelSegment> {
    let duration = sanitize_duration(duration);
    let rate = if rate_pct.is_finite() {
        rate_pct.clamp(0.0, 100.0)
    } else {
        100.0
    };
    let parallel = duration * (1.0 - rate / 100.0);
    if parallel > EDGE_EPS {
        vec![ParallelSegment::anchored(
            duration - parallel,
            duration,
            SegmentAnchor::Back,
        )]
    } else {
        Vec::new()
    }
}

/// Carry segments over to a new duration.
///
/// Segments anchored at the start keep their length from the start, segments
/// anchored at the end keep their length from the end, interior segments stay
/// where they are and are clipped. A segment placed as front overlap stays at
/// the start even when it covers the whole task.
pub fn refit_segments(
    segments: &[ParallelSegment],
    old_duration: f64,
    new_duration: f64,
) -> Vec<ParallelSegment> {
    let old_duration = sanitize_duration(old_duration);
    let new_duration = sanitize_duration(new_duration);
    if old_duration == 0.0 {
        return normalize_segments(new_duration, segments);
    }

    let moved: Vec<ParallelSegment> = normalize_segments(old_duration, segments)
        .into_iter()
        .map(|s| {
            let length = s.length();
            let at_start = s.start <= EDGE_EPS;
            let at_end = s.end >= old_duration - EDGE_EPS;
            if at_start && s.anchor == SegmentAnchor::Front {
                ParallelSegment::anchored(0.0, length, s.anchor)
            } else if at_end {
                ParallelSegment::anchored(new_duration - length, new_duration, s.anchor)
            } else if at_start {
                ParallelSegment::anchored(0.0, length, s.anchor)
            } else {
                s
            }
        })
        .collect();
    normalize_segments(new_duration, &moved)
}

/// Normalize a task's segments and rewrite its projected fields.
pub fn sync_task(task: &mut Task) {
    let segments = normalize_segments(task.calendar_days, &task.parallel_segments);
    let meta = segments_to_metadata(task.calendar_days, &segments);
    task.parallel_segments = segments;
    task.front_parallel_days = meta.front_parallel_days;
    task.back_parallel_days = meta.back_parallel_days;
    task.application_rate = meta.application_rate;
}

/// Re-fit a task's segments after its duration changed from `old_duration`.
pub fn refit_task(task: &mut Task, old_duration: f64) {
    task.parallel_segments =
        refit_segments(&task.parallel_segments, old_duration, task.calendar_days);
    sync_task(task);
}

/// Replace a task's segments with the front/back projection.
pub fn set_front_back(task: &mut Task, front: f64, back: f64) {
    task.parallel_segments = front_back_to_segments(task.calendar_days, front, back);
    sync_task(task);
}

/// Replace a task's segments with the right-aligned segment for `rate_pct`.
pub fn set_application_rate(task: &mut Task, rate_pct: f64) {
    task.parallel_segments = segments_for_application_rate(task.calendar_days, rate_pct);
    sync_task(task);
}
