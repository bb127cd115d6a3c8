use async_trait::async_trait;

use crate::{
    error::Result,
    graph::Step,
    state::{MedicalHistory, StateDelta, WorkflowState},
    storage::RunInput,
};

/// Result of a task execution
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Fields to merge into the run's state
    pub delta: StateDelta,
    /// Response to send to the user
    pub response: Option<String>,
    /// Next action to take
    pub next_action: NextAction,
    /// Short description of what happened, kept on the session
    pub status_message: Option<String>,
}

impl TaskResult {
    pub fn new(delta: StateDelta, next_action: NextAction) -> Self {
        Self {
            delta,
            response: None,
            next_action,
            status_message: None,
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_status(mut self, status_message: impl Into<String>) -> Self {
        self.status_message = Some(status_message.into());
        self
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Follow the transition table to the next step
    Continue,
    /// Suspend the run until the caller supplies input
    WaitForInput,
    /// The run is finished
    End,
}

/// What a task gets to look at
pub struct TaskInput<'a> {
    /// Resumption token of the run being executed
    pub session_id: &'a str,
    pub state: &'a WorkflowState,
    pub run_input: &'a RunInput,
    /// Medical history supplied when resuming a suspended run
    pub reply: Option<&'a MedicalHistory>,
}

/// Core trait that all workflow steps implement
#[async_trait]
pub trait Task: Send + Sync {
    /// The workflow step this task implements
    fn step(&self) -> Step;

    /// Reads the current state and returns the delta to merge
    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult>;
}
