//! FlowRunner – loads a session, drives the workflow, and persists the session after every
//! step boundary.
//!
//! ```rust,ignore
//! let runner = FlowRunner::new(Arc::new(workflow), Arc::new(InMemorySessionStorage::new()));
//! let session_id = runner.create_session(RunInput::new("mild headache")).await?;
//!
//! // runs until the history pause
//! let result = runner.run(&session_id).await?;
//! assert_eq!(result.status, ExecutionStatus::WaitingForInput);
//!
//! // later, possibly from another request
//! let result = runner
//!     .resume(&session_id, MedicalHistory::from_reply(Some("asthma")))
//!     .await?;
//! ```
//!
//! A failed step leaves the session stored with `RunStatus::Failed` and its last valid
//! state, so callers can inspect it before starting over.

use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    graph::{ExecutionResult, Workflow, ensure_resumable, execution_result},
    state::MedicalHistory,
    storage::{RunInput, Session, SessionStorage},
};

/// High-level helper that orchestrates the _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    workflow: Arc<Workflow>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(workflow: Arc<Workflow>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { workflow, storage }
    }

    /// Stores a fresh session and returns its resumption token
    pub async fn create_session(&self, input: RunInput) -> Result<String> {
        let session = Session::new(input);
        let id = session.id.clone();
        self.storage.save(session).await?;
        Ok(id)
    }

    /// Drives a ready session until it suspends or completes
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let session = self.load(session_id).await?;
        self.drive(session, None).await
    }

    /// Resumes a suspended session with the user's history reply
    pub async fn resume(&self, session_id: &str, reply: MedicalHistory) -> Result<ExecutionResult> {
        let session = self.load(session_id).await?;
        ensure_resumable(&session)?;
        self.drive(session, Some(reply)).await
    }

    pub async fn get(&self, session_id: &str) -> Result<Session> {
        self.load(session_id).await
    }

    /// Lets integrations reject a second resume before calling [`FlowRunner::resume`]
    pub async fn is_past_history(&self, session_id: &str) -> Result<bool> {
        Ok(self.load(session_id).await?.is_past_history())
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    async fn drive(
        &self,
        mut session: Session,
        mut reply: Option<MedicalHistory>,
    ) -> Result<ExecutionResult> {
        loop {
            let outcome = self.workflow.step_once(&mut session, reply.take()).await;
            self.storage.save(session.clone()).await?;

            if let Some((response, status)) = outcome?.into_finished() {
                return Ok(execution_result(&session, response, status));
            }
        }
    }
}
