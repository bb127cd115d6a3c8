use async_trait::async_trait;
use tracing::info;

use super::prompts;
use crate::{
    error::{FlowError, Result},
    graph::Step,
    state::{MedicalHistory, StateDelta},
    task::{NextAction, Task, TaskInput, TaskResult},
};

/// The human-in-the-loop checkpoint.
///
/// First entry without history pauses the run; the resumed entry consumes the reply.
pub struct CollectMedicalHistoryTask;

#[async_trait]
impl Task for CollectMedicalHistoryTask {
    fn step(&self) -> Step {
        Step::AwaitHistory
    }

    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult> {
        let state = input.state;

        if state.medical_history().is_some() {
            info!("Medical history already known, not pausing");
            return Ok(TaskResult::new(StateDelta::default(), NextAction::Continue)
                .with_status("Medical history supplied with the request"));
        }

        if let Some(reply) = input.reply {
            let status = match reply {
                MedicalHistory::Provided(_) => "Medical history collected",
                MedicalHistory::Declined => "No additional medical history provided",
            };
            info!(declined = matches!(reply, MedicalHistory::Declined), "{}", status);
            return Ok(TaskResult::new(
                StateDelta {
                    medical_history: Some(reply.clone()),
                    awaiting_history: Some(false),
                    ..Default::default()
                },
                NextAction::Continue,
            )
            .with_status(status));
        }

        let analysis = state.analysis().ok_or_else(|| {
            FlowError::Validation("medical history requested before analysis".to_string())
        })?;

        info!("Waiting for medical history from the user");
        Ok(TaskResult::new(
            StateDelta {
                awaiting_history: Some(true),
                ..Default::default()
            },
            NextAction::WaitForInput,
        )
        .with_response(prompts::history_request(analysis))
        .with_status("Waiting for medical history"))
    }
}
