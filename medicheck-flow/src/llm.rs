use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::{
    contracts::{ContractSpec, StructuredOutput},
    error::{FlowError, Result},
    tools::SearchHandle,
};

const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Provider settings, passed explicitly into the invoker
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
    pub max_tool_turns: usize,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
            max_tool_turns: 3,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the config from `OPENROUTER_API_KEY`, `LLM_MODEL`, `LLM_TEMPERATURE`,
    /// `LLM_TIMEOUT_SECS` and `LLM_MAX_TOOL_TURNS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;
        let mut config = Self::new(api_key);

        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.model = model;
        }
        if let Ok(raw) = std::env::var("LLM_TEMPERATURE") {
            config.temperature = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("LLM_TEMPERATURE is not a number: {}", e))?;
        }
        if let Ok(raw) = std::env::var("LLM_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("LLM_TIMEOUT_SECS is not a number: {}", e))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(raw) = std::env::var("LLM_MAX_TOOL_TURNS") {
            config.max_tool_turns = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("LLM_MAX_TOOL_TURNS is not a number: {}", e))?;
        }
        Ok(config)
    }
}

/// One structured request to the provider
#[derive(Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub contract: ContractSpec,
    /// Search the model may call before answering
    pub search: Option<SearchHandle>,
}

/// The LLM invocation capability.
///
/// Implementations return a JSON value meant to conform to `request.contract`, or a
/// classified failure (`Provider`, `RateLimited`, `Timeout`, `SchemaViolation` when the
/// reply is not JSON at all).
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    async fn invoke(&self, request: LlmRequest) -> Result<Value>;
}

/// Invokes the provider and checks the reply against `T`'s contract
pub async fn invoke_structured<T: StructuredOutput>(
    llm: &dyn LlmInvoker,
    prompt: String,
    search: Option<SearchHandle>,
) -> Result<T> {
    let value = llm
        .invoke(LlmRequest {
            prompt,
            contract: T::spec(),
            search,
        })
        .await?;
    T::from_value(value)
}

/// Pulls a JSON object out of a model reply, tolerating code fences and chatter
pub fn parse_json_reply(contract: &str, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&unfenced[start..=end]).map_err(|e| {
                FlowError::schema(contract, format!("reply is not valid JSON: {}", e))
            })
        }
        _ => Err(FlowError::schema(contract, "reply contained no JSON object")),
    }
}

/// Maps a provider error message onto the error classification
pub fn classify_provider_error(message: &str) -> FlowError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        FlowError::RateLimited(message.to_string())
    } else {
        FlowError::Provider(message.to_string())
    }
}

#[cfg(feature = "rig")]
pub use rig_backend::RigInvoker;

#[cfg(feature = "rig")]
mod rig_backend {
    use super::{LlmConfig, LlmInvoker, LlmRequest, classify_provider_error, parse_json_reply};
    use crate::{
        error::{FlowError, Result},
        tools::{SearchHandle, SearchHit},
    };
    use async_trait::async_trait;
    use rig::{
        client::CompletionClient,
        completion::{Prompt, ToolDefinition},
        providers::openrouter,
        tool::Tool,
    };
    use serde::Deserialize;
    use serde_json::{Value, json};
    use tracing::{debug, info};

    /// [`LlmInvoker`] backed by a rig OpenRouter agent
    pub struct RigInvoker {
        client: openrouter::Client,
        config: LlmConfig,
    }

    impl RigInvoker {
        pub fn new(config: LlmConfig) -> Self {
            let client = openrouter::Client::new(&config.api_key);
            Self { client, config }
        }

        fn preamble(&self, request: &LlmRequest) -> String {
            let tool_hint = if request.search.is_some() {
                "You may call the `web_search` tool to look up medical conditions, diagnostic \
                 criteria or treatments before answering. It is optional.\n"
            } else {
                ""
            };
            format!(
                "You are a careful medical triage assistant providing educational information only.\n\
                 {tool_hint}\
                 Respond ONLY with a JSON object for `{}` conforming to this JSON schema, with no \
                 text before or after it:\n{}",
                request.contract.name, request.contract.schema
            )
        }
    }

    #[async_trait]
    impl LlmInvoker for RigInvoker {
        async fn invoke(&self, request: LlmRequest) -> Result<Value> {
            let preamble = self.preamble(&request);
            let contract = request.contract.name;
            info!(contract = %contract, model = %self.config.model, "Invoking LLM");

            let call = async {
                match request.search.clone() {
                    Some(handle) => {
                        let agent = self
                            .client
                            .agent(&self.config.model)
                            .preamble(&preamble)
                            .temperature(self.config.temperature)
                            .tool(WebSearchTool { handle })
                            .build();
                        agent
                            .prompt(request.prompt.as_str())
                            .multi_turn(self.config.max_tool_turns)
                            .await
                    }
                    None => {
                        let agent = self
                            .client
                            .agent(&self.config.model)
                            .preamble(&preamble)
                            .temperature(self.config.temperature)
                            .build();
                        agent.prompt(request.prompt.as_str()).await
                    }
                }
            };

            let raw = tokio::time::timeout(self.config.timeout, call)
                .await
                .map_err(|_| FlowError::Timeout(self.config.timeout))?
                .map_err(|e| classify_provider_error(&e.to_string()))?;

            debug!(contract = %contract, "LLM raw response: {}", raw);
            parse_json_reply(contract, &raw)
        }
    }

    #[derive(Deserialize)]
    struct WebSearchArgs {
        query: String,
    }

    /// Exposes a [`SearchHandle`] to the agent as a callable tool
    struct WebSearchTool {
        handle: SearchHandle,
    }

    impl Tool for WebSearchTool {
        const NAME: &'static str = "web_search";
        type Error = std::convert::Infallible;
        type Args = WebSearchArgs;
        type Output = Vec<SearchHit>;

        async fn definition(&self, _prompt: String) -> ToolDefinition {
            ToolDefinition {
                name: Self::NAME.to_string(),
                description: "Search the web for medical information. Returns titles, short \
                              summaries and source URLs."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "A single search query" }
                    },
                    "required": ["query"]
                }),
            }
        }

        async fn call(&self, args: Self::Args) -> std::result::Result<Self::Output, Self::Error> {
            // spawned so the tool future holds only a JoinHandle and stays Sync
            let handle = self.handle.clone();
            let hits = tokio::spawn(async move { handle.lookup(&args.query).await }).await;
            Ok(hits.unwrap_or_default())
        }
    }
}
