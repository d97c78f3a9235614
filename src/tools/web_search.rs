use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Tool, ToolArtifact, ToolOutput, query_argument, query_schema};
use crate::error::{SearchProviderError, ToolError};
use crate::models::WebSearchConfig;
use crate::utils::retry::{RetryConfig, with_retry};

pub const WEB_SEARCH_TOOL: &str = "internet_search";

const DESCRIPTION: &str = "Search the internet for real-time information. Use this to \
supplement an answer when the knowledge base does not cover the topic, for example \
recent news, regulation changes or niche subjects.";

const NO_RESULTS: &str = "The web search returned no results.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default, alias = "content")]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, SearchProviderError>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    topic: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<WebResult>,
}

/// Tavily `/search` client.
pub struct TavilySearch {
    client: Client,
    base_url: String,
    api_key: String,
    max_results: u32,
    topic: String,
}

impl TavilySearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self, SearchProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SearchProviderError::NotConfigured("TAVILY_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchProviderError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            max_results: config.max_results,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, SearchProviderError> {
        let url = format!("{}/search", self.base_url);
        let request = TavilyRequest {
            query,
            max_results: self.max_results,
            topic: &self.topic,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    SearchProviderError::Connection(e.to_string())
                } else {
                    SearchProviderError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchProviderError::Server { status, body });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchProviderError::InvalidResponse(e.to_string()))?;

        Ok(parsed.results)
    }
}

/// Exposes a [`SearchProvider`] to the agent.
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    retry: RetryConfig,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        query_schema("Web search query")
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = query_argument(self.name(), &args)?;

        let results = with_retry(&self.retry, || self.provider.search(&query))
            .await
            .into_result()
            .map_err(|e| ToolError::Failed {
                tool: self.name().to_string(),
                reason: e.to_string(),
            })?;

        if results.is_empty() {
            return Ok(ToolOutput::text(NO_RESULTS));
        }

        let content = results
            .iter()
            .map(|r| format!("{}\n{}\n{}", r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolOutput::with_artifact(
            content,
            ToolArtifact::WebResults(results),
        ))
    }
}
