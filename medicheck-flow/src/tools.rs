//! Web search made available to the analysis step.
//!
//! The step never sees search failures: [`SearchHandle::lookup`] turns them into an
//! empty result and records whatever was found for later steps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Longest snippet kept from a search result
pub const MAX_SNIPPET_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub summary: String,
    pub source: String,
}

/// External lookup capability
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchHit>>;
}

/// Shared handle given to the analysis step for one run.
#[derive(Clone)]
pub struct SearchHandle {
    tool: Arc<dyn SearchTool>,
    max_results: usize,
    collected: Arc<Mutex<Vec<SearchHit>>>,
}

impl SearchHandle {
    pub fn new(tool: Arc<dyn SearchTool>, max_results: usize) -> Self {
        Self {
            tool,
            max_results: max_results.max(1),
            collected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runs a query. Failures and empty results both come back as an empty list.
    pub async fn lookup(&self, query: &str) -> Vec<SearchHit> {
        let hits = match self.tool.search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed, continuing without context");
                return Vec::new();
            }
        };

        let hits: Vec<SearchHit> = dedup_by_source(hits)
            .into_iter()
            .take(self.max_results)
            .map(|mut hit| {
                hit.summary = truncate_snippet(&hit.summary);
                hit
            })
            .collect();

        info!(query = %query, results = hits.len(), "Search completed");
        if let Ok(mut collected) = self.collected.lock() {
            for hit in &hits {
                if !collected.iter().any(|c| c.source == hit.source) {
                    collected.push(hit.clone());
                }
            }
        }
        hits
    }

    /// Everything found so far, deduplicated by source
    pub fn collected(&self) -> Vec<SearchHit> {
        self.collected.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

fn dedup_by_source(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut unique: Vec<SearchHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        if !unique.iter().any(|u| u.source == hit.source) {
            unique.push(hit);
        }
    }
    unique
}

fn truncate_snippet(text: &str) -> String {
    if text.chars().count() <= MAX_SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_SNIPPET_CHARS).collect();
    format!("{cut}...")
}

/// Formats hits for inclusion in a prompt
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No additional research available.".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "--- SOURCE {}: {} ---\nURL: {}\n\nSUMMARY:\n{}\n",
                i + 1,
                hit.title,
                hit.source,
                hit.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "tavily")]
pub use tavily::{SearchConfig, TavilySearch};

#[cfg(feature = "tavily")]
mod tavily {
    use super::{SearchHit, SearchTool};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use tracing::debug;

    const TAVILY_URL: &str = "https://api.tavily.com/search";

    #[derive(Debug, Clone)]
    pub struct SearchConfig {
        pub api_key: String,
        pub max_results: usize,
        pub topic: String,
    }

    impl SearchConfig {
        /// Reads `TAVILY_API_KEY` and `SEARCH_MAX_RESULTS`. Returns `Ok(None)` when search is
        /// not configured.
        pub fn from_env() -> anyhow::Result<Option<Self>> {
            let Ok(api_key) = std::env::var("TAVILY_API_KEY") else {
                return Ok(None);
            };
            let max_results = match std::env::var("SEARCH_MAX_RESULTS") {
                Ok(raw) => raw
                    .parse::<usize>()
                    .map_err(|e| anyhow!("SEARCH_MAX_RESULTS is not a number: {}", e))?,
                Err(_) => 3,
            };
            Ok(Some(Self {
                api_key,
                max_results,
                topic: "general".to_string(),
            }))
        }
    }

    #[derive(Deserialize)]
    struct TavilyResponse {
        #[serde(default)]
        results: Vec<TavilyResult>,
    }

    #[derive(Deserialize)]
    struct TavilyResult {
        title: String,
        url: String,
        #[serde(default)]
        content: String,
    }

    pub struct TavilySearch {
        client: reqwest::Client,
        config: SearchConfig,
    }

    impl TavilySearch {
        pub fn new(config: SearchConfig) -> Self {
            Self {
                client: reqwest::Client::new(),
                config,
            }
        }
    }

    #[async_trait]
    impl SearchTool for TavilySearch {
        async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchHit>> {
            debug!(query = %query, "Querying Tavily");
            let response = self
                .client
                .post(TAVILY_URL)
                .json(&json!({
                    "api_key": self.config.api_key,
                    "query": query,
                    "max_results": self.config.max_results,
                    "topic": self.config.topic,
                    "include_raw_content": false,
                }))
                .send()
                .await
                .map_err(|e| anyhow!("Tavily request failed: {}", e))?
                .error_for_status()
                .map_err(|e| anyhow!("Tavily returned an error: {}", e))?;

            let body: TavilyResponse = response
                .json()
                .await
                .map_err(|e| anyhow!("Failed to parse Tavily response: {}", e))?;

            Ok(body
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    summary: r.content,
                    source: r.url,
                })
                .collect())
        }
    }
}
