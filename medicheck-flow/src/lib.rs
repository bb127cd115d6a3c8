pub mod contracts;
pub mod error;
pub mod graph;
pub mod llm;
pub mod report;
pub mod runner;
pub mod state;
pub mod storage;
pub mod task;
pub mod tasks;
pub mod tools;

// Re-export commonly used types
pub use contracts::{
    EscalationAdvice, Likelihood, PossibleCondition, Recommendation, RecommendationCategory,
    Recommendations, StructuredOutput, SymptomAnalysis, Urgency,
};
pub use error::{ErrorKind, FlowError, Result};
pub use graph::{ExecutionResult, ExecutionStatus, Step, StepOutcome, Workflow, WorkflowBuilder};
pub use llm::{LlmConfig, LlmInvoker, LlmRequest};
#[cfg(feature = "rig")]
pub use llm::RigInvoker;
pub use report::{FileReportSink, ReportSink};
pub use runner::FlowRunner;
pub use state::{MedicalHistory, Report, StateDelta, WorkflowState};
pub use storage::{FailureInfo, InMemorySessionStorage, RunInput, RunStatus, Session, SessionStorage};
pub use task::{NextAction, Task, TaskInput, TaskResult};
pub use tools::{SearchHandle, SearchHit, SearchTool};
#[cfg(feature = "tavily")]
pub use tools::{SearchConfig, TavilySearch};
