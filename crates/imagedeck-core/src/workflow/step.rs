use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::api::CallError;
use crate::models::Ack;

use super::error::StepFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Active,
    Done,
    Error,
}

impl StepStatus {
    /// Pending → Active → (Done | Error). Done and Error are terminal.
    pub fn can_become(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Active)
                | (StepStatus::Active, StepStatus::Done)
                | (StepStatus::Active, StepStatus::Error)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Done => "done",
            StepStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: String,
    pub status: StepStatus,
}

/// What a successful reply must contain for a step to count as done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// `status` equals this literal
    Status(&'static str),
    /// No `error` field in the reply
    NoErrorField,
}

impl Expectation {
    pub fn check(&self, ack: &Ack) -> Result<(), StepFailure> {
        match self {
            Expectation::Status(expected) => match ack.status() {
                Some(actual) if actual == *expected => Ok(()),
                actual => Err(StepFailure::AcknowledgementMismatch {
                    expected: format!("status \"{}\"", expected),
                    actual: match actual {
                        Some(s) => format!("status \"{}\"", s),
                        None => ack.body().to_string(),
                    },
                }),
            },
            Expectation::NoErrorField => match ack.error_message() {
                None => Ok(()),
                Some(message) => Err(StepFailure::AcknowledgementMismatch {
                    expected: "no error".to_string(),
                    actual: message,
                }),
            },
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Status(s) => write!(f, "status \"{}\"", s),
            Expectation::NoErrorField => f.write_str("no error"),
        }
    }
}

type Execute = Box<dyn FnOnce(String) -> BoxFuture<'static, Result<Ack, CallError>> + Send>;

/// One remote operation of a workflow.
///
/// `execute` receives the bearer token current at the moment the step starts.
pub struct StepSpec {
    pub(crate) label: String,
    pub(crate) expect: Expectation,
    pub(crate) execute: Execute,
}

impl StepSpec {
    pub fn new<F, Fut>(label: impl Into<String>, expect: Expectation, execute: F) -> Self
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Ack, CallError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            expect,
            execute: Box::new(move |token| execute(token).boxed()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expect
    }
}

impl fmt::Debug for StepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSpec")
            .field("label", &self.label)
            .field("expect", &self.expect)
            .finish_non_exhaustive()
    }
}
