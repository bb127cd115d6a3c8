use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::prompts;
use crate::{
    contracts::Recommendations,
    error::{FlowError, Result},
    graph::Step,
    llm::{LlmInvoker, invoke_structured},
    state::StateDelta,
    task::{NextAction, Task, TaskInput, TaskResult},
};

/// Patient-facing recommendations; runs on both urgency paths
pub struct CreateRecommendationsTask {
    llm: Arc<dyn LlmInvoker>,
}

impl CreateRecommendationsTask {
    pub fn new(llm: Arc<dyn LlmInvoker>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Task for CreateRecommendationsTask {
    fn step(&self) -> Step {
        Step::Recommend
    }

    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult> {
        let state = input.state;
        let symptoms = state
            .symptoms()
            .ok_or_else(|| FlowError::Validation("symptoms not found".to_string()))?;
        let analysis = state
            .analysis()
            .ok_or_else(|| FlowError::Validation("symptom analysis not found".to_string()))?;

        let prompt = prompts::recommendations(
            symptoms,
            analysis,
            state.medical_history(),
            state.research(),
        );
        let recommendations =
            invoke_structured::<Recommendations>(self.llm.as_ref(), prompt, None).await?;

        info!(items = recommendations.items.len(), "Recommendations generated");

        Ok(TaskResult::new(
            StateDelta {
                recommendations: Some(recommendations),
                ..Default::default()
            },
            NextAction::Continue,
        )
        .with_status("Patient recommendations generated"))
    }
}
