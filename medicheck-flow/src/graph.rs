use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{Instrument, error, info, info_span};

use crate::{
    error::{FlowError, Result},
    llm::LlmInvoker,
    report::ReportSink,
    state::{MedicalHistory, WorkflowState},
    storage::{RunStatus, Session},
    task::{NextAction, Task, TaskInput},
    tasks::{
        AnalyzeSymptomsTask, CollectMedicalHistoryTask, CollectPatientInfoTask,
        CreateRecommendationsTask, EscalationAdviceTask, GenerateReportTask,
    },
    tools::SearchTool,
};

/// States of the workflow, in topological order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CollectInfo,
    Analyze,
    AwaitHistory,
    Recommend,
    Escalate,
    Report,
}

impl Step {
    pub const START: Step = Step::CollectInfo;

    pub fn as_str(self) -> &'static str {
        match self {
            Step::CollectInfo => "collect_patient_info",
            Step::Analyze => "analyze_symptoms",
            Step::AwaitHistory => "collect_medical_history",
            Step::Recommend => "create_recommendations",
            Step::Escalate => "escalation_advice",
            Step::Report => "generate_report",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition table. `None` means the step is terminal.
///
/// The urgency branch reads the `is_urgent` flag frozen by the analysis step.
pub fn next_step(current: Step, state: &WorkflowState) -> Option<Step> {
    match current {
        Step::CollectInfo => Some(Step::Analyze),
        Step::Analyze => Some(Step::AwaitHistory),
        Step::AwaitHistory => Some(Step::Recommend),
        Step::Recommend if state.is_urgent() => Some(Step::Escalate),
        Step::Recommend => Some(Step::Report),
        Step::Escalate => Some(Step::Report),
        Step::Report => None,
    }
}

/// Status of a driven run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Suspended at the history step; resume with the session id
    WaitingForInput,
    /// Workflow completed successfully
    Completed,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub session_id: String,
    /// Prompt for the user when suspended, report path when completed
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

/// Outcome of advancing exactly one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced(Step),
    Suspended(Option<String>),
    Completed(Option<String>),
}

impl StepOutcome {
    /// Response and status when the drive loop should stop, `None` while it advances
    pub fn into_finished(self) -> Option<(Option<String>, ExecutionStatus)> {
        match self {
            StepOutcome::Advanced(_) => None,
            StepOutcome::Suspended(response) => Some((response, ExecutionStatus::WaitingForInput)),
            StepOutcome::Completed(response) => Some((response, ExecutionStatus::Completed)),
        }
    }
}

/// The symptom-analysis workflow: one task per [`Step`] plus the driver.
pub struct Workflow {
    collect_info: Arc<dyn Task>,
    analyze: Arc<dyn Task>,
    await_history: Arc<dyn Task>,
    recommend: Arc<dyn Task>,
    escalate: Arc<dyn Task>,
    report: Arc<dyn Task>,
}

impl Workflow {
    pub fn builder(llm: Arc<dyn LlmInvoker>, sink: Arc<dyn ReportSink>) -> WorkflowBuilder {
        WorkflowBuilder::new(llm, sink)
    }

    fn task(&self, step: Step) -> &Arc<dyn Task> {
        match step {
            Step::CollectInfo => &self.collect_info,
            Step::Analyze => &self.analyze,
            Step::AwaitHistory => &self.await_history,
            Step::Recommend => &self.recommend,
            Step::Escalate => &self.escalate,
            Step::Report => &self.report,
        }
    }

    /// Executes the session's current step and moves it to the next state.
    ///
    /// On failure the session is marked failed and keeps its last valid state.
    pub async fn step_once(
        &self,
        session: &mut Session,
        reply: Option<MedicalHistory>,
    ) -> Result<StepOutcome> {
        match (&session.status, &reply) {
            (RunStatus::Completed, _) => {
                return Err(FlowError::StateMachine(format!(
                    "session {} already completed",
                    session.id
                )));
            }
            (RunStatus::Failed(info), _) => {
                return Err(FlowError::StateMachine(format!(
                    "session {} failed at {} and must be restarted",
                    session.id, info.step
                )));
            }
            (RunStatus::Suspended, None) => {
                return Err(FlowError::StateMachine(format!(
                    "session {} is waiting for medical history",
                    session.id
                )));
            }
            (RunStatus::Ready, Some(_)) => {
                return Err(FlowError::StateMachine(format!(
                    "session {} is not waiting for medical history",
                    session.id
                )));
            }
            _ => {}
        }

        let step = session.current_step;
        let task = self.task(step).clone();
        debug_assert_eq!(task.step(), step);
        let span = info_span!("step", session_id = %session.id, step = %step);

        let outcome = async {
            let result = task
                .run(TaskInput {
                    session_id: &session.id,
                    state: &session.state,
                    run_input: &session.input,
                    reply: reply.as_ref(),
                })
                .await?;
            session.state.merge(result.delta)?;
            Ok::<_, FlowError>((result.next_action, result.response, result.status_message))
        }
        .instrument(span)
        .await;

        let (next_action, response, status_message) = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                error!(session_id = %session.id, step = %step, error = %e, "Step failed, run aborted");
                session.fail(&e);
                return Err(e);
            }
        };
        session.status_message = status_message;

        match next_action {
            NextAction::WaitForInput => {
                info!(session_id = %session.id, step = %step, "Run suspended");
                session.status = RunStatus::Suspended;
                Ok(StepOutcome::Suspended(response))
            }
            NextAction::End => {
                info!(session_id = %session.id, "Run completed");
                session.status = RunStatus::Completed;
                Ok(StepOutcome::Completed(response))
            }
            NextAction::Continue => match next_step(step, &session.state) {
                Some(next) => {
                    session.current_step = next;
                    session.status = RunStatus::Ready;
                    Ok(StepOutcome::Advanced(next))
                }
                None => {
                    let e = FlowError::StateMachine(format!("no transition out of {step}"));
                    session.fail(&e);
                    Err(e)
                }
            },
        }
    }

    /// Drives a ready session until it suspends or completes
    pub async fn run(&self, session: &mut Session) -> Result<ExecutionResult> {
        self.drive(session, None).await
    }

    /// Resumes a suspended session with the user's medical history reply
    pub async fn resume(
        &self,
        session: &mut Session,
        reply: MedicalHistory,
    ) -> Result<ExecutionResult> {
        ensure_resumable(session)?;
        self.drive(session, Some(reply)).await
    }

    async fn drive(
        &self,
        session: &mut Session,
        mut reply: Option<MedicalHistory>,
    ) -> Result<ExecutionResult> {
        loop {
            let outcome = self.step_once(session, reply.take()).await?;
            if let Some((response, status)) = outcome.into_finished() {
                return Ok(execution_result(session, response, status));
            }
        }
    }
}

pub(crate) fn ensure_resumable(session: &Session) -> Result<()> {
    if !session.is_suspended() || !session.state.awaiting_history() || session.is_past_history() {
        return Err(FlowError::StateMachine(format!(
            "session {} is not waiting for medical history",
            session.id
        )));
    }
    Ok(())
}

pub(crate) fn execution_result(
    session: &Session,
    response: Option<String>,
    status: ExecutionStatus,
) -> ExecutionResult {
    ExecutionResult {
        session_id: session.id.clone(),
        response,
        status,
    }
}

/// Builder wiring the capabilities into the six steps
pub struct WorkflowBuilder {
    llm: Arc<dyn LlmInvoker>,
    sink: Arc<dyn ReportSink>,
    search: Option<Arc<dyn SearchTool>>,
    max_search_results: usize,
}

impl WorkflowBuilder {
    pub fn new(llm: Arc<dyn LlmInvoker>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            llm,
            sink,
            search: None,
            max_search_results: 3,
        }
    }

    /// Makes web search available to the analysis step
    pub fn with_search(mut self, search: Arc<dyn SearchTool>, max_results: usize) -> Self {
        self.search = Some(search);
        self.max_search_results = max_results;
        self
    }

    pub fn build(self) -> Workflow {
        Workflow {
            collect_info: Arc::new(CollectPatientInfoTask),
            analyze: Arc::new(AnalyzeSymptomsTask::new(
                self.llm.clone(),
                self.search,
                self.max_search_results,
            )),
            await_history: Arc::new(CollectMedicalHistoryTask),
            recommend: Arc::new(CreateRecommendationsTask::new(self.llm.clone())),
            escalate: Arc::new(EscalationAdviceTask::new(self.llm)),
            report: Arc::new(GenerateReportTask::new(self.sink)),
        }
    }
}
