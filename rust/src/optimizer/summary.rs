//! Contract for the external service that writes a natural-language run summary.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::log::RunStatus;

/// Facts about a finished run handed to the summarizer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryPayload {
    pub target_days: f64,
    pub current_days: f64,
    pub saved_days: f64,
    pub remaining_days: f64,
    pub status: RunStatus,
    /// Descriptions of the committed steps, in order.
    pub critical_steps: Vec<String>,
    /// Reason codes that blocked tasks during the run, first occurrence order.
    pub constraints: Vec<String>,
}

/// Failures of the summarization service. Never fatal to a run.
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Summary service unavailable: {0}")]
    Unavailable(String),
    #[error("Summary request timed out")]
    Timeout,
    #[error("Invalid summary response: {0}")]
    InvalidResponse(String),
}

/// External summarization collaborator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a summary, or `None` when there is nothing worth saying.
    async fn summarize(&self, payload: &SummaryPayload) -> Result<Option<String>, SummaryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_with_status_string() {
        let payload = SummaryPayload {
            target_days: 20.0,
            current_days: 16.8,
            saved_days: 7.2,
            remaining_days: 0.0,
            status: RunStatus::Success,
            critical_steps: vec!["crew 2 -> 3".to_string()],
            constraints: vec![],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["critical_steps"][0], "crew 2 -> 3");
        assert_eq!(json["remaining_days"], 0.0);
    }
}
