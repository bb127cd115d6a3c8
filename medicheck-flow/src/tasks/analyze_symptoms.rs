use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use crate::{
    contracts::SymptomAnalysis,
    error::{FlowError, Result},
    graph::Step,
    llm::{LlmInvoker, invoke_structured},
    state::StateDelta,
    task::{NextAction, Task, TaskInput, TaskResult},
    tools::{SearchHandle, SearchTool},
};

/// Attempts per run: the first call plus one retry
const MAX_ATTEMPTS: u32 = 2;

/// Structured symptom analysis, optionally enriched by web search
pub struct AnalyzeSymptomsTask {
    llm: Arc<dyn LlmInvoker>,
    search: Option<Arc<dyn SearchTool>>,
    max_search_results: usize,
}

impl AnalyzeSymptomsTask {
    pub fn new(
        llm: Arc<dyn LlmInvoker>,
        search: Option<Arc<dyn SearchTool>>,
        max_search_results: usize,
    ) -> Self {
        Self {
            llm,
            search,
            max_search_results,
        }
    }
}

#[async_trait]
impl Task for AnalyzeSymptomsTask {
    fn step(&self) -> Step {
        Step::Analyze
    }

    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult> {
        let symptoms = input
            .state
            .symptoms()
            .ok_or_else(|| FlowError::Validation("no symptoms to analyze".to_string()))?;

        let prompt = prompts::symptom_analysis(symptoms, input.state.medical_history());
        let mut attempt = 1;
        let (analysis, handle) = loop {
            // fresh per attempt: hits gathered by a discarded reply are not research
            let handle = self
                .search
                .as_ref()
                .map(|tool| SearchHandle::new(tool.clone(), self.max_search_results));
            match invoke_structured::<SymptomAnalysis>(
                self.llm.as_ref(),
                prompt.clone(),
                handle.clone(),
            )
            .await
            {
                Ok(analysis) => break (analysis, handle),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "Symptom analysis failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let is_urgent = analysis.urgency.is_urgent();
        let research = handle.map(|h| h.collected()).filter(|hits| !hits.is_empty());
        info!(
            urgency = %analysis.urgency,
            conditions = analysis.possible_conditions.len(),
            research_sources = research.as_ref().map_or(0, Vec::len),
            "Symptom analysis completed"
        );

        let status = format!("Symptom analysis completed. Urgency level: {}", analysis.urgency);
        Ok(TaskResult::new(
            StateDelta {
                analysis: Some(analysis),
                is_urgent: Some(is_urgent),
                research,
                ..Default::default()
            },
            NextAction::Continue,
        )
        .with_status(status))
    }
}
