use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use crate::{
    contracts::{EscalationAdvice, StructuredOutput},
    error::{FlowError, Result},
    graph::Step,
    llm::{LlmInvoker, invoke_structured},
    state::StateDelta,
    task::{NextAction, Task, TaskInput, TaskResult},
};

/// Urgent-path guidance; only reached when the analysis marked the run urgent
pub struct EscalationAdviceTask {
    llm: Arc<dyn LlmInvoker>,
}

impl EscalationAdviceTask {
    pub fn new(llm: Arc<dyn LlmInvoker>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Task for EscalationAdviceTask {
    fn step(&self) -> Step {
        Step::Escalate
    }

    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult> {
        let state = input.state;
        if !state.is_urgent() {
            warn!("Escalation reached on a non-urgent run, skipping");
            return Ok(TaskResult::new(StateDelta::default(), NextAction::Continue)
                .with_status("Case not urgent, escalation advice not needed"));
        }

        let analysis = state
            .analysis()
            .ok_or_else(|| FlowError::Validation("symptom analysis not found".to_string()))?;

        let prompt = prompts::escalation(analysis, state.recommendations());
        let advice = invoke_structured::<EscalationAdvice>(self.llm.as_ref(), prompt, None).await?;
        if advice.urgency != analysis.urgency {
            return Err(FlowError::schema(
                EscalationAdvice::NAME,
                format!(
                    "urgency `{}` does not restate the analysed urgency `{}`",
                    advice.urgency, analysis.urgency
                ),
            ));
        }

        info!(
            urgency = %advice.urgency,
            actions = advice.immediate_actions.len(),
            "Escalation advice generated"
        );

        Ok(TaskResult::new(
            StateDelta {
                escalation: Some(advice),
                ..Default::default()
            },
            NextAction::Continue,
        )
        .with_status("Urgent escalation advice generated"))
    }
}
