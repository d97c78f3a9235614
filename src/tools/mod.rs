//! Tools the agent can call while answering.
//!
//! Every tool takes a JSON argument object and returns text for the model
//! plus an optional structured artifact used for source attribution.

mod knowledge_base;
mod web_search;

pub use knowledge_base::{KNOWLEDGE_BASE_TOOL, KnowledgeBaseTool};
pub use web_search::{SearchProvider, TavilySearch, WEB_SEARCH_TOOL, WebResult, WebSearchTool};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ToolError;
use crate::llm::{ToolCall, ToolDefinition};
use crate::models::Chunk;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolArtifact {
    Chunks(Vec<Chunk>),
    WebResults(Vec<WebResult>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub artifact: Option<ToolArtifact>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(content: impl Into<String>, artifact: ToolArtifact) -> Self {
        Self {
            content: content.into(),
            artifact: Some(artifact),
        }
    }

    /// Citations for knowledge-base chunks, in rank order.
    pub fn citations(&self) -> Vec<String> {
        match &self.artifact {
            Some(ToolArtifact::Chunks(chunks)) => {
                chunks.iter().map(|c| c.citation().to_string()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the argument object.
    fn input_schema(&self) -> Value;

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.input_schema())
    }
}

/// Schema shared by the single-argument search tools.
pub(crate) fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": description}
        },
        "required": ["query"]
    })
}

/// Extract a non-blank `query` string argument.
pub(crate) fn query_argument(tool: &str, args: &Value) -> Result<String, ToolError> {
    args.get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: "expected a non-empty string field 'query'".to_string(),
        })
}

/// Tools by name, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run a model-requested call with a deadline.
    pub async fn invoke(&self, call: &ToolCall, timeout: Duration) -> Result<ToolOutput, ToolError> {
        let name = call.function.name.as_str();
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let raw = call.function.arguments.trim();
        let args: Value = if raw.is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?
        };

        debug!(tool = name, call_id = %call.id, "invoking tool");
        tokio::time::timeout(timeout, tool.call(args))
            .await
            .map_err(|_| ToolError::Timeout(name.to_string()))?
    }
}
