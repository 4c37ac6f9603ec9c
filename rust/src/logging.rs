//! Stderr diagnostics for schedule compression, gated by verbosity.
//!
//! Every entry the optimizer writes to its run log is echoed here at the level
//! its [`LogKind`] maps to, so a terminal shows the same story the caller gets
//! back. The macros cover the lines that never reach the run log.
//! - 0: SILENT (only errors)
//! - 1: CHANGES (committed moves, results, summaries)
//! - 2: CHECKS (iteration status and per-task rejections)
//! - 3: DEBUG (every candidate evaluated)

use crate::optimizer::{LogEntry, LogKind};

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: committed moves, run start and finish, summary failures.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            eprintln!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: rejected critical tasks and their reason codes.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            eprintln!($($arg)*);
        }
    };
}

/// Verbosity at which a run log entry of `kind` is echoed.
pub fn level_for(kind: LogKind) -> u8 {
    match kind {
        LogKind::Step | LogKind::Result | LogKind::Summary => VERBOSITY_CHANGES,
        LogKind::Status | LogKind::Reason => VERBOSITY_CHECKS,
    }
}

/// Echo a run log entry to stderr, tagged with its kind.
pub fn echo_entry(verbosity: u8, entry: &LogEntry) {
    let kind = entry.kind.as_str();
    match level_for(entry.kind) {
        VERBOSITY_CHANGES => log_changes!(verbosity, "[OPTIMIZE] [{}] {}", kind, entry.message),
        _ => log_checks!(verbosity, "[OPTIMIZE] [{}] {}", kind, entry.message),
    }
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: individual candidate moves and their scores.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            eprintln!($($arg)*);
        }
    };
}
