use medicheck_flow::{ExecutionResult, ExecutionStatus, FailureInfo, RunStatus, Session, WorkflowState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub symptoms: String,
    /// Supplying history up front skips the pause
    #[serde(default)]
    pub medical_history: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResumeRequest {
    /// Missing, empty, "no", "none" or "n/a" declines
    #[serde(default)]
    pub medical_history: Option<String>,
}

/// Returned by the endpoints that drive a run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub session_id: String,
    pub status: String,
    /// Question for the user while waiting for input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

impl From<ExecutionResult> for RunResponse {
    fn from(result: ExecutionResult) -> Self {
        let (status, prompt, report_path) = match result.status {
            ExecutionStatus::WaitingForInput => ("waiting_for_input", result.response, None),
            ExecutionStatus::Completed => ("completed", None, result.response),
        };
        Self {
            session_id: result.session_id,
            status: status.to_string(),
            prompt,
            report_path,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: String,
    pub current_step: String,
    pub status_message: Option<String>,
    pub waiting_for_input: bool,
    pub state: WorkflowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        let status = match &session.status {
            RunStatus::Ready => "active",
            RunStatus::Suspended => "waiting_for_input",
            RunStatus::Completed => "completed",
            RunStatus::Failed(_) => "failed",
        };
        Self {
            status: status.to_string(),
            current_step: session.current_step.to_string(),
            waiting_for_input: session.is_suspended(),
            failure: session.failure().cloned(),
            session_id: session.id,
            status_message: session.status_message,
            state: session.state,
        }
    }
}
