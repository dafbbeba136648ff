//! Multi-step operator workflows: step model, runner and the ready-made plans.

pub mod error;
pub mod plans;
pub mod runner;
pub mod step;

pub use error::{PlanError, StepFailure, WorkflowError};
pub use runner::{Orchestrator, Workflow, WorkflowStatus};
pub use step::{Expectation, Step, StepSpec, StepStatus};
