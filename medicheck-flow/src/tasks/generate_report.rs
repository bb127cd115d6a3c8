use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    graph::Step,
    report::{ReportSink, render_report, report_identifier},
    state::{Report, StateDelta},
    task::{NextAction, Task, TaskInput, TaskResult},
};

/// Renders everything gathered so far and hands it to the sink
pub struct GenerateReportTask {
    sink: Arc<dyn ReportSink>,
}

impl GenerateReportTask {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Task for GenerateReportTask {
    fn step(&self) -> Step {
        Step::Report
    }

    async fn run(&self, input: TaskInput<'_>) -> Result<TaskResult> {
        let state = input.state;
        let symptoms = state
            .symptoms()
            .ok_or_else(|| FlowError::Validation("symptoms not found".to_string()))?;

        let now = Utc::now();
        let document = render_report(state, now);
        let identifier = report_identifier(symptoms, input.session_id, now);
        let path = self.sink.save(&document, &identifier).await?;

        info!(path = %path, escalated = state.escalation().is_some(), "Medical report generated");

        let status = format!("Medical analysis complete! Report saved to: {path}");
        Ok(TaskResult::new(
            StateDelta {
                report: Some(Report {
                    identifier,
                    path: path.clone(),
                    document,
                }),
                ..Default::default()
            },
            NextAction::End,
        )
        .with_response(path)
        .with_status(status))
    }
}
