use async_trait::async_trait;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    graph::Step,
    state::{MedicalHistory, StateDelta},
    task::{NextAction, Task, TaskInput, TaskResult},
};

/// Normalises the raw input into the initial state. No LLM call.
pub struct CollectPatientInfoTask;

/// Collapses runs of whitespace and trims the ends
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Task for CollectPatientInfoTask {
    fn step(&self) -> Step {
        Step::CollectInfo
    }

    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult> {
        let symptoms = normalize(&input.run_input.symptoms);
        if symptoms.is_empty() {
            return Err(FlowError::Validation(
                "symptoms must not be empty".to_string(),
            ));
        }

        // History given up front skips the pause later on.
        let medical_history = input
            .run_input
            .medical_history
            .as_deref()
            .map(|raw| MedicalHistory::from_reply(Some(&normalize(raw))));

        info!(
            symptoms_len = symptoms.len(),
            history_supplied = medical_history.is_some(),
            "Patient information collected"
        );

        Ok(TaskResult::new(
            StateDelta {
                symptoms: Some(symptoms),
                medical_history,
                ..Default::default()
            },
            NextAction::Continue,
        )
        .with_status("Patient information collected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, state::WorkflowState, storage::RunInput};

    #[tokio::test]
    async fn normalises_whitespace() {
        let state = WorkflowState::default();
        let run_input = RunInput::new("  mild   headache\n and fatigue ");
        let result = CollectPatientInfoTask
            .run(TaskInput {
                session_id: "session-1",
                state: &state,
                run_input: &run_input,
                reply: None,
            })
            .await
            .unwrap();

        assert_eq!(result.delta.symptoms.as_deref(), Some("mild headache and fatigue"));
        assert!(result.delta.medical_history.is_none());
        assert_eq!(result.next_action, NextAction::Continue);
    }

    #[tokio::test]
    async fn rejects_blank_symptoms() {
        let state = WorkflowState::default();
        let run_input = RunInput::new(" \t\n");
        let err = CollectPatientInfoTask
            .run(TaskInput {
                session_id: "session-1",
                state: &state,
                run_input: &run_input,
                reply: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn keeps_up_front_history() {
        let state = WorkflowState::default();
        let run_input = RunInput::new("cough").with_medical_history("none");
        let result = CollectPatientInfoTask
            .run(TaskInput {
                session_id: "session-1",
                state: &state,
                run_input: &run_input,
                reply: None,
            })
            .await
            .unwrap();
        assert_eq!(result.delta.medical_history, Some(MedicalHistory::Declined));
    }
}
