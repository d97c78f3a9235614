//! Deterministic doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{EmbeddingError, ModelError};
use crate::llm::{ChatMessage, ChatModel, ChatRole, ModelResponse, ToolCall, ToolDefinition};
use crate::services::embedding::{Embedder, Embedding};

const VOCABULARY: [&str; 7] = ["maize", "wheat", "barley", "oat", "irrigat", "nitrogen", "pest"];

/// Bag-of-keywords embedder that records every call.
pub struct KeywordEmbedder {
    calls: Mutex<Vec<(usize, Instant)>>,
    fail_on_call: Option<usize>,
    transient_failures: AtomicUsize,
}

impl KeywordEmbedder {
    pub const DIMENSION: usize = VOCABULARY.len() + 1;

    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on_call: None,
            transient_failures: AtomicUsize::new(0),
        }
    }

    /// The n-th call (1-based) fails permanently.
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// The first `n` calls time out.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().iter().map(|(n, _)| *n).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, t)| *t).collect()
    }

    pub fn vector(text: &str) -> Embedding {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let call = {
            let mut calls = self.calls.lock();
            calls.push((texts.len(), Instant::now()));
            calls.len()
        };

        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EmbeddingError::Timeout);
        }
        if self.fail_on_call == Some(call) {
            return Err(EmbeddingError::InvalidInput("rejected by test".to_string()));
        }

        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// One scripted model reply.
pub enum Step {
    Respond(ModelResponse),
    /// Reply after a delay, for timeout and cancellation tests.
    Delayed(Duration, ModelResponse),
    /// A non-retryable provider failure.
    Fail,
}

/// Chat model that replays a script, then echoes the last user message.
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    /// Working contexts received, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }

    pub fn tool_request(id: &str, tool: &str, query: &str) -> ModelResponse {
        let arguments = serde_json::json!({ "query": query }).to_string();
        ModelResponse::with_tool_calls(vec![ToolCall::new(id, tool, arguments)])
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        self.requests.lock().push(messages.to_vec());
        let step = self.steps.lock().pop_front();

        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Step::Fail) => Err(ModelError::InvalidResponse("scripted failure".to_string())),
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == ChatRole::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(ModelResponse::text(format!("echo: {last_user}")))
            }
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
