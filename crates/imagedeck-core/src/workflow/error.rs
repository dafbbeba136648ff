use thiserror::Error;

use crate::api::CallError;

/// Why a single step failed.
#[derive(Error, Debug)]
pub enum StepFailure {
    /// Timeout, HTTP status, unparseable body or transport failure
    #[error("{0}")]
    Call(#[from] CallError),

    /// The server answered, but not with what this step waits for
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    AcknowledgementMismatch { expected: String, actual: String },

    #[error("Session ended; log in again")]
    SessionLost,
}

impl StepFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StepFailure::Call(e) if e.is_timeout())
    }

    /// Short category for status lines
    pub fn kind(&self) -> &'static str {
        match self {
            StepFailure::Call(CallError::Timeout(_)) => "timeout",
            StepFailure::Call(CallError::HttpStatus { .. }) => "http error",
            StepFailure::Call(CallError::InvalidBody(_)) => "unexpected payload",
            StepFailure::Call(CallError::Network(_)) => "network error",
            StepFailure::AcknowledgementMismatch { .. } => "unexpected reply",
            StepFailure::SessionLost => "session lost",
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("No session found. Log in first.")]
    NoSession,

    #[error("Step {} ({label}) failed: {failure}", .index + 1)]
    Step {
        index: usize,
        label: String,
        failure: StepFailure,
    },
}

impl WorkflowError {
    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            WorkflowError::Step { failure, .. } => Some(failure),
            WorkflowError::NoSession => None,
        }
    }
}

/// Input rejected before any remote call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("Invalid image name '{0}'. Only letters, numbers and \"-\" are allowed.")]
    InvalidImageName(String),

    #[error("Image '{0}' not found in the available images list.")]
    UnknownImage(String),

    #[error("Invalid value for max time to wait. Must be at least 1 second.")]
    InvalidMaxTime,

    #[error("No configuration changes to apply.")]
    NoChanges,

    #[error("Validation failed for: {}", .0.join(", "))]
    InvalidFields(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failure_kinds_are_distinct() {
        let timeout = StepFailure::from(CallError::Timeout(Duration::from_secs(60)));
        let http = StepFailure::from(CallError::HttpStatus {
            status: 500,
            body: "boom".into(),
        });
        let payload = StepFailure::from(CallError::InvalidBody("<html>".into()));
        let mismatch = StepFailure::AcknowledgementMismatch {
            expected: "status \"drbl started\"".into(),
            actual: "status \"drbl failed\"".into(),
        };

        assert!(timeout.is_timeout());
        assert!(!http.is_timeout());
        assert_eq!(timeout.kind(), "timeout");
        assert_eq!(http.kind(), "http error");
        assert_eq!(payload.kind(), "unexpected payload");
        assert_eq!(mismatch.kind(), "unexpected reply");
        assert_eq!(StepFailure::SessionLost.kind(), "session lost");
    }

    #[test]
    fn test_workflow_error_message_is_one_based() {
        let err = WorkflowError::Step {
            index: 1,
            label: "Restore disk from image".into(),
            failure: CallError::Timeout(Duration::from_secs(60)).into(),
        };
        assert_eq!(
            err.to_string(),
            "Step 2 (Restore disk from image) failed: Request timed out after 60s"
        );
        assert!(err.failure().unwrap().is_timeout());
        assert!(WorkflowError::NoSession.failure().is_none());
    }

    #[test]
    fn test_plan_error_lists_fields() {
        let err = PlanError::InvalidFields(vec!["general.range".into(), "eth1.range".into()]);
        assert_eq!(err.to_string(), "Validation failed for: general.range, eth1.range");
    }
}
