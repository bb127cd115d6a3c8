use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ErrorKind, FlowError, Result},
    graph::Step,
    state::WorkflowState,
};

/// What the user typed to start a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    pub symptoms: String,
    #[serde(default)]
    pub medical_history: Option<String>,
}

impl RunInput {
    pub fn new(symptoms: impl Into<String>) -> Self {
        Self {
            symptoms: symptoms.into(),
            medical_history: None,
        }
    }

    pub fn with_medical_history(mut self, history: impl Into<String>) -> Self {
        self.medical_history = Some(history.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub step: Step,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Ready to execute `current_step`
    Ready,
    /// Paused at the history step until the caller resumes
    Suspended,
    Completed,
    Failed(FailureInfo),
}

/// One run: the resumption token plus a full snapshot of its state.
///
/// A serialised session is the checkpoint handed back while a run is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub input: RunInput,
    pub current_step: Step,
    pub status: RunStatus,
    pub state: WorkflowState,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(input: RunInput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input,
            current_step: Step::START,
            status: RunStatus::Ready,
            state: WorkflowState::default(),
            status_message: None,
            created_at: Utc::now(),
        }
    }

    /// Guard against double resume: true once the run no longer needs history
    pub fn is_past_history(&self) -> bool {
        self.current_step > Step::AwaitHistory
            || self.state.medical_history().is_some()
            || matches!(self.status, RunStatus::Completed)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.status, RunStatus::Suspended)
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        match &self.status {
            RunStatus::Failed(info) => Some(info),
            _ => None,
        }
    }

    pub(crate) fn fail(&mut self, error: &FlowError) {
        self.status = RunStatus::Failed(FailureInfo {
            step: self.current_step,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn to_checkpoint(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| FlowError::Storage(format!("Failed to serialise session: {}", e)))
    }

    pub fn from_checkpoint(checkpoint: &str) -> Result<Self> {
        serde_json::from_str(checkpoint)
            .map_err(|e| FlowError::Storage(format!("Failed to restore session: {}", e)))
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_storage_round_trip() {
        let storage = InMemorySessionStorage::new();
        let session = Session::new(RunInput::new("cough"));
        let id = session.id.clone();

        storage.save(session.clone()).await.unwrap();
        assert_eq!(storage.get(&id).await.unwrap(), Some(session));

        storage.delete(&id).await.unwrap();
        assert!(storage.get(&id).await.unwrap().is_none());
    }

    #[test]
    fn new_session_starts_ready_at_collect_info() {
        let session = Session::new(RunInput::new("cough").with_medical_history("asthma"));
        assert_eq!(session.current_step, Step::CollectInfo);
        assert_eq!(session.status, RunStatus::Ready);
        assert!(!session.is_past_history());
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn failure_is_recorded_with_its_kind() {
        let mut session = Session::new(RunInput::new("cough"));
        session.fail(&FlowError::Validation("bad".to_string()));
        let info = session.failure().unwrap();
        assert_eq!(info.kind, ErrorKind::Validation);
        assert_eq!(info.step, Step::CollectInfo);
    }
}
