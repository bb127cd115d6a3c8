use medicheck_flow::{
    FileReportSink, FlowRunner, InMemorySessionStorage, LlmConfig, RigInvoker, SearchConfig,
    SessionStorage, TavilySearch, Workflow,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Wires the OpenRouter invoker, optional Tavily search and the file report sink from
/// the environment.
pub fn build_medical_workflow() -> anyhow::Result<Workflow> {
    let llm_config = LlmConfig::from_env()?;
    info!(model = %llm_config.model, "Using OpenRouter model");

    let llm = Arc::new(RigInvoker::new(llm_config));
    let sink = Arc::new(FileReportSink::from_env());
    let builder = Workflow::builder(llm, sink);

    let builder = match SearchConfig::from_env()? {
        Some(search) => {
            let max_results = search.max_results;
            info!(max_results, "Web search enabled");
            builder.with_search(Arc::new(TavilySearch::new(search)), max_results)
        }
        None => {
            warn!("TAVILY_API_KEY not set, analysis runs without web search");
            builder
        }
    };

    Ok(builder.build())
}

/// Runs are independent, so sessions live in memory for the lifetime of the process
pub fn create_flow_runner(workflow: Workflow) -> FlowRunner {
    let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
    FlowRunner::new(Arc::new(workflow), session_storage)
}
