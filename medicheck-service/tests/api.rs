use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use medicheck_flow::{FlowError, LlmInvoker, LlmRequest, ReportSink, Workflow};
use medicheck_service::{AppState, build_router, create_flow_runner};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Answers every contract with a fixed valid reply; urgency follows the symptoms
struct StubLlm {
    fail_analysis: bool,
}

#[async_trait]
impl LlmInvoker for StubLlm {
    async fn invoke(&self, request: LlmRequest) -> medicheck_flow::Result<Value> {
        let urgency = if request.prompt.contains("chest pain") {
            "emergency"
        } else {
            "routine"
        };
        match request.contract.name {
            "SymptomAnalysis" if self.fail_analysis => {
                Err(FlowError::Provider("upstream unavailable".to_string()))
            }
            "SymptomAnalysis" => Ok(json!({
                "symptom_summary": "Reported symptoms",
                "possible_conditions": [{ "name": "Common cold", "likelihood": "moderate" }],
                "urgency": urgency,
                "reasoning": "Typical presentation"
            })),
            "Recommendations" => Ok(json!({
                "items": [{ "category": "self_care", "text": "Rest" }],
                "when_to_seek_help": "If symptoms worsen"
            })),
            _ => Ok(json!({
                "urgency": "emergency",
                "urgency_message": "Seek care now",
                "immediate_actions": ["Call emergency services"],
                "contact_guidance": "Dial your local emergency number"
            })),
        }
    }
}

struct DiscardSink;

#[async_trait]
impl ReportSink for DiscardSink {
    async fn save(&self, _document: &str, identifier: &str) -> medicheck_flow::Result<String> {
        Ok(format!("reports/{identifier}.md"))
    }
}

fn app_with(fail_analysis: bool) -> Router {
    let workflow =
        Workflow::builder(Arc::new(StubLlm { fail_analysis }), Arc::new(DiscardSink)).build();
    build_router(AppState::new(create_flow_runner(workflow)))
}

fn app() -> Router {
    app_with(false)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_and_index() {
    let app = app();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["POST /medical/analyze"].is_string());
}

#[tokio::test]
async fn analyze_pauses_then_resume_completes() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/medical/analyze",
        Some(json!({ "symptoms": "runny nose and sneezing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "waiting_for_input");
    assert!(body["prompt"].as_str().unwrap().contains("medical history"));
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/medical/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["waiting_for_input"], true);
    assert_eq!(body["current_step"], "collect_medical_history");
    assert_eq!(body["state"]["awaiting_history"], true);
    assert!(body["state"]["recommendations"].is_null());

    let (status, body) = send(
        &app,
        "POST",
        &format!("/medical/{session_id}/resume"),
        Some(json!({ "medical_history": "none" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["report_path"].as_str().unwrap().starts_with("reports/medical_analysis_"));

    let (_, body) = send(&app, "GET", &format!("/medical/{session_id}"), None).await;
    assert_eq!(body["status"], "completed");
    assert!(body["state"]["escalation"].is_null());
    assert!(
        body["state"]["report"]["document"]
            .as_str()
            .unwrap()
            .contains("## Recommendations")
    );
}

#[tokio::test]
async fn second_resume_conflicts() {
    let app = app();
    let (_, body) = send(
        &app,
        "POST",
        "/medical/analyze",
        Some(json!({ "symptoms": "chest pain and sweating" })),
    )
    .await;
    let session_id = body["session_id"].as_str().unwrap().to_string();
    let resume = format!("/medical/{session_id}/resume");

    let (status, _) = send(&app, "POST", &resume, Some(json!({ "medical_history": "diabetes" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("/medical/{session_id}"), None).await;
    assert_eq!(body["state"]["is_urgent"], true);
    assert_eq!(body["state"]["escalation"]["urgency"], "emergency");

    let (status, body) = send(&app, "POST", &resume, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["session_id"], session_id);
}

#[tokio::test]
async fn history_up_front_completes_in_one_call() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/medical/analyze",
        Some(json!({ "symptoms": "sore throat", "medical_history": "asthma" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body.get("prompt").is_none());
}

#[tokio::test]
async fn blank_symptoms_are_rejected() {
    let (status, body) = send(
        &app(),
        "POST",
        "/medical/analyze",
        Some(json!({ "symptoms": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Symptoms are required");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = app();
    let (status, body) = send(&app, "GET", "/medical/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "session_not_found");

    let (status, _) = send(
        &app,
        "POST",
        "/medical/does-not-exist/resume",
        Some(json!({ "medical_history": "none" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_run_stays_inspectable() {
    let app = app_with(true);
    let (status, body) = send(
        &app,
        "POST",
        "/medical/analyze",
        Some(json!({ "symptoms": "fever" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "provider");
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/medical/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["failure"]["step"], "analyze");
    assert_eq!(body["failure"]["kind"], "provider");
    assert_eq!(body["state"]["symptoms"], "fever");
}
