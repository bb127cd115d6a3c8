use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use medicheck_flow::{ErrorKind, FlowError, FlowRunner, MedicalHistory, RunInput};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    models::{AnalyzeRequest, ResumeRequest, RunResponse, SessionResponse},
    workflow::{build_medical_workflow, create_flow_runner},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn conflict_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

/// Maps a workflow error onto a status code, keeping the session id so a failed run can
/// still be inspected.
fn flow_error(e: &FlowError, session_id: &str) -> ApiError {
    let status = match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::SessionNotFound => StatusCode::NOT_FOUND,
        ErrorKind::StateMachine => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(session_id = %session_id, error = %e, "Workflow error");
    } else {
        warn!(session_id = %session_id, error = %e, "Rejected request");
    }
    (
        status,
        Json(json!({
            "error": e.to_string(),
            "kind": e.kind(),
            "session_id": session_id
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub flow_runner: FlowRunner,
}

impl AppState {
    pub fn new(flow_runner: FlowRunner) -> Self {
        Self { flow_runner }
    }
}

/// Builds the application from the environment
pub fn create_app() -> anyhow::Result<Router> {
    let workflow = build_medical_workflow()?;
    Ok(build_router(AppState::new(create_flow_runner(workflow))))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/medical/analyze", post(start_analysis))
        .route("/medical/{session_id}", get(get_session_status))
        .route("/medical/{session_id}/resume", post(resume_with_history))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "MediCheck Symptom Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Educational symptom triage with a medical-history checkpoint. Not medical advice.",
        "endpoints": {
            "POST /medical/analyze": "Start a new symptom analysis",
            "GET /medical/{session_id}": "Get session status and results",
            "POST /medical/{session_id}/resume": "Provide (or decline) medical history to resume",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<RunResponse> {
    if request.symptoms.trim().is_empty() {
        return Err(bad_request_error("Symptoms are required"));
    }

    let mut input = RunInput::new(request.symptoms);
    if let Some(history) = request.medical_history {
        input = input.with_medical_history(history);
    }

    let session_id = state
        .flow_runner
        .create_session(input)
        .await
        .map_err(|e| flow_error(&e, ""))?;
    info!(session_id = %session_id, "Starting symptom analysis");

    let result = state
        .flow_runner
        .run(&session_id)
        .await
        .map_err(|e| flow_error(&e, &session_id))?;
    info!(session_id = %session_id, status = ?result.status, "Analysis run returned");

    Ok(Json(result.into()))
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = state
        .flow_runner
        .get(&session_id)
        .await
        .map_err(|e| flow_error(&e, &session_id))?;
    Ok(Json(session.into()))
}

async fn resume_with_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ResumeRequest>,
) -> ApiResult<RunResponse> {
    let past_history = state
        .flow_runner
        .is_past_history(&session_id)
        .await
        .map_err(|e| flow_error(&e, &session_id))?;
    if past_history {
        return Err(conflict_error("Medical history already provided", &session_id));
    }

    let reply = MedicalHistory::from_reply(request.medical_history.as_deref());
    info!(
        session_id = %session_id,
        declined = matches!(reply, MedicalHistory::Declined),
        "Resuming with medical history"
    );

    let result = state
        .flow_runner
        .resume(&session_id, reply)
        .await
        .map_err(|e| flow_error(&e, &session_id))?;

    Ok(Json(result.into()))
}
