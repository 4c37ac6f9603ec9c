//! Run log records, rejection reasons and run status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an optimization run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Success,
    Fail,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Fail | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a run log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Step,
    Status,
    Reason,
    Summary,
    Result,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Step => "step",
            LogKind::Status => "status",
            LogKind::Reason => "reason",
            LogKind::Summary => "summary",
            LogKind::Result => "result",
        }
    }
}

/// One line of the run log shown to the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Why a critical task produced no eligible move in an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Shortening the task no longer shortens the project.
    NotCriticalAfterRecalc,
    /// Best move saves less than the minimum threshold.
    MicroSaving,
    /// Crew is already at its ceiling.
    CongestionLimit,
    /// Productivity boost is already at its ceiling.
    ProductivityCap,
    /// Task lacks the data needed to resize it.
    ConstraintBlocked,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::NotCriticalAfterRecalc => "NOT_CRITICAL_AFTER_RECALC",
            RejectReason::MicroSaving => "MICRO_SAVING",
            RejectReason::CongestionLimit => "CONGESTION_LIMIT",
            RejectReason::ProductivityCap => "PRODUCTIVITY_CAP",
            RejectReason::ConstraintBlocked => "CONSTRAINT_BLOCKED",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_serialize_as_codes() {
        for reason in [
            RejectReason::NotCriticalAfterRecalc,
            RejectReason::MicroSaving,
            RejectReason::CongestionLimit,
            RejectReason::ProductivityCap,
            RejectReason::ConstraintBlocked,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, serde_json::Value::String(reason.code().to_string()));
        }
    }

    #[test]
    fn test_log_entry_shape() {
        let entry = LogEntry::new(LogKind::Step, "crew 2 -> 3");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "step");
        assert_eq!(json["message"], "crew 2 -> 3");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Idle.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Fail.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert_eq!(RunStatus::Cancelled.to_string(), "cancelled");
    }
}
