//! Sequential, stop-on-first-failure execution of remote steps.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::SessionStore;

use super::error::{StepFailure, WorkflowError};
use super::step::{Step, StepSpec, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Observable state of the current (or last) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    steps: Vec<Step>,
    status: WorkflowStatus,
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            status: WorkflowStatus::Idle,
        }
    }
}

impl Workflow {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn done_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Done)
            .count()
    }

    /// Fraction of steps done, in `[0, 1]`. An empty workflow reports 0.
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.done_count() as f64 / self.steps.len() as f64
    }

    fn reset(&mut self, labels: impl IntoIterator<Item = String>) {
        self.steps = labels
            .into_iter()
            .map(|label| Step {
                label,
                status: StepStatus::Pending,
            })
            .collect();
        self.status = WorkflowStatus::Running;
    }

    fn transition(&mut self, index: usize, next: StepStatus) {
        let step = &mut self.steps[index];
        debug_assert!(
            step.status.can_become(next),
            "illegal step transition {:?} -> {:?}",
            step.status,
            next
        );
        debug!(step = index + 1, label = %step.label, from = step.status.label(), to = next.label(), "Step transition");
        step.status = next;
    }
}

/// Runs step specs against the current session, one at a time.
pub struct Orchestrator {
    session: Arc<SessionStore>,
    workflow: Workflow,
}

impl Orchestrator {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            workflow: Workflow::default(),
        }
    }

    /// State of the last run. Stays visible until the next `run`.
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub async fn run(&mut self, steps: Vec<StepSpec>) -> Result<(), WorkflowError> {
        self.run_with_progress(steps, |_| {}).await
    }

    /// Run `steps` in order, calling `on_progress` after every transition.
    ///
    /// Stops at the first failure: the failing step is marked `Error` and every
    /// later step stays `Pending`. The session is checked before each step, so
    /// a session lost mid-run fails the next step without a remote call.
    pub async fn run_with_progress<F>(
        &mut self,
        steps: Vec<StepSpec>,
        mut on_progress: F,
    ) -> Result<(), WorkflowError>
    where
        F: FnMut(&Workflow),
    {
        if !self.session.is_active() {
            warn!("Workflow rejected: no session");
            return Err(WorkflowError::NoSession);
        }

        let total = steps.len();
        self.workflow.reset(steps.iter().map(|s| s.label.clone()));
        info!(steps = total, "Workflow started");
        on_progress(&self.workflow);

        for (index, spec) in steps.into_iter().enumerate() {
            let StepSpec {
                label,
                expect,
                execute,
            } = spec;

            self.workflow.transition(index, StepStatus::Active);
            on_progress(&self.workflow);

            let outcome = match self.session.token() {
                None => Err(StepFailure::SessionLost),
                Some(token) => {
                    info!(step = index + 1, total, %label, "Running step");
                    match execute(token).await {
                        Ok(ack) => expect.check(&ack),
                        Err(e) => Err(StepFailure::from(e)),
                    }
                }
            };

            match outcome {
                Ok(()) => {
                    self.workflow.transition(index, StepStatus::Done);
                    on_progress(&self.workflow);
                }
                Err(failure) => {
                    warn!(step = index + 1, %label, kind = failure.kind(), error = %failure, "Step failed");
                    self.workflow.transition(index, StepStatus::Error);
                    self.workflow.status = WorkflowStatus::Failed;
                    on_progress(&self.workflow);
                    return Err(WorkflowError::Step {
                        index,
                        label,
                        failure,
                    });
                }
            }
        }

        self.workflow.status = WorkflowStatus::Completed;
        on_progress(&self.workflow);
        info!(steps = total, "Workflow completed");
        Ok(())
    }
}
