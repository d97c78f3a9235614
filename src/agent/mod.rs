//! Tool-calling conversational agent.
//!
//! One call to [`Agent::chat`] is one turn: the user's retained history and
//! new message go to the model, any requested tools run through the
//! [`ToolRegistry`], and the loop repeats until the model answers or the
//! iteration cap is reached. The final answer has its task block parsed and
//! stripped, and the user/assistant exchange is appended to the
//! [`ConversationStore`].
//!
//! Turns for the same user are serialized; different users never wait on
//! each other.

pub mod prompts;
pub mod state;
pub mod task_block;

pub use state::{AgentState, Completion, ModelDecision};
pub use task_block::{ParsedAnswer, extract_tasks};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AgentError, ModelError};
use crate::llm::{ChatMessage, ChatModel, ModelResponse, ToolDefinition};
use crate::models::{Config, ConversationTurn, PlannerTask, Role};
use crate::services::conversation::ConversationStore;
use crate::tools::ToolRegistry;
use crate::utils::retry::{RetryConfig, with_retry};

use prompts::{GENERIC_FAILURE, INCOMPLETE_ANSWER};

pub const DEFAULT_MAX_ITERATIONS: u32 = 8;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model invocations allowed per turn.
    pub max_iterations: u32,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    /// Replaces the prompt built from the registered tools.
    pub system_prompt: Option<String>,
    pub retry: RetryConfig,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            system_prompt: None,
            retry: RetryConfig::default(),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.agent.max_iterations.max(1),
            model_timeout: Duration::from_secs(config.agent.model_timeout_secs),
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
            system_prompt: config.agent.system_prompt.clone(),
            retry: RetryConfig::from(&config.retry),
        }
    }
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    /// Answer shown to the user, without the task block.
    pub answer: String,
    /// Knowledge-base citations gathered from tool artifacts, first use first.
    pub sources: Vec<String>,
    pub tasks: Vec<PlannerTask>,
    /// The iteration cap stopped the turn before a final answer.
    pub incomplete: bool,
    /// Tool invocations made during the turn.
    pub tool_calls: usize,
}

/// What the loop produced before post-processing.
struct LoopOutcome {
    completion: Completion,
    final_text: Option<String>,
    last_text: Option<String>,
    sources: Vec<String>,
    tool_calls: usize,
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    store: Arc<dyn ConversationStore>,
    settings: AgentSettings,
    system_prompt: String,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        store: Arc<dyn ConversationStore>,
        settings: AgentSettings,
    ) -> Self {
        let system_prompt = settings
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompts::system_prompt(&tools.names()));
        Self {
            model,
            tools,
            store,
            settings,
            system_prompt,
            user_locks: DashMap::new(),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Answer `message` for `user_id`. A cancelled turn returns
    /// [`AgentError::Cancelled`] and leaves the history untouched.
    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let lock = self.user_lock(user_id);
        let _guard = tokio::select! {
            guard = lock.lock() => guard,
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
        };

        let history = self.store.history(user_id).await?;
        info!(user = user_id, history = history.len(), "starting turn");

        let mut context = Vec::with_capacity(history.len() + 2);
        context.push(ChatMessage::system(self.system_prompt.as_str()));
        context.extend(history.iter().map(turn_message));
        context.push(ChatMessage::user(message));

        let outcome = self.run_loop(&mut context, cancel).await?;
        let response = self.finish_turn(outcome);

        if cancel.is_cancelled() {
            info!(user = user_id, "turn abandoned, discarding result");
            return Err(AgentError::Cancelled);
        }

        self.store
            .append_exchange(
                user_id,
                ConversationTurn::user(message),
                ConversationTurn::assistant(response.answer.as_str()),
            )
            .await?;

        info!(
            user = user_id,
            tool_calls = response.tool_calls,
            sources = response.sources.len(),
            tasks = response.tasks.len(),
            incomplete = response.incomplete,
            "turn complete"
        );
        Ok(response)
    }

    async fn run_loop(
        &self,
        context: &mut Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome, AgentError> {
        let definitions = self.tools.definitions();
        let max_iterations = self.settings.max_iterations.max(1);

        let mut state = AgentState::AwaitingInput.start();
        let mut iterations = 0;
        let mut outcome = LoopOutcome {
            completion: Completion::Final,
            final_text: None,
            last_text: None,
            sources: Vec::new(),
            tool_calls: 0,
        };

        while !state.is_answering() {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            iterations += 1;
            debug!(iteration = iterations, max_iterations, "invoking model");

            let response = match self.invoke_model(context, &definitions).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, iteration = iterations, "model call failed");
                    state = state.next(ModelDecision::Unavailable, iterations, max_iterations);
                    continue;
                }
            };

            if let Some(text) = response.text_content() {
                outcome.last_text = Some(text.to_string());
            }

            state = state.next(ModelDecision::from(&response), iterations, max_iterations);
            match state {
                AgentState::ToolCall => {
                    self.run_tools(response, context, &mut outcome).await;
                    state = state.tools_done();
                }
                AgentState::Answering(Completion::Final) => {
                    outcome.final_text = response.content;
                }
                _ => {}
            }
        }

        if let AgentState::Answering(completion) = state {
            outcome.completion = completion;
        }
        if outcome.completion == Completion::IterationLimit {
            warn!(max_iterations, "tool iteration limit reached, returning partial answer");
        }
        Ok(outcome)
    }

    async fn invoke_model(
        &self,
        context: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        let model = self.model.as_ref();
        let deadline = self.settings.model_timeout;

        with_retry(&self.settings.retry, || async move {
            tokio::time::timeout(deadline, model.complete(context, tools))
                .await
                .map_err(|_| ModelError::Timeout)?
        })
        .await
        .into_result()
    }

    /// Run every requested call in order. Failures are reported back to the
    /// model as tool output.
    async fn run_tools(
        &self,
        response: ModelResponse,
        context: &mut Vec<ChatMessage>,
        outcome: &mut LoopOutcome,
    ) {
        let calls = response.tool_calls;
        context.push(ChatMessage::assistant_tool_calls(response.content, calls.clone()));

        for call in &calls {
            outcome.tool_calls += 1;
            let content = match self.tools.invoke(call, self.settings.tool_timeout).await {
                Ok(output) => {
                    for citation in output.citations() {
                        if !outcome.sources.contains(&citation) {
                            outcome.sources.push(citation);
                        }
                    }
                    output.content
                }
                Err(e) => {
                    warn!(tool = %call.function.name, error = %e, "tool call failed");
                    format!("Error: {e}")
                }
            };
            context.push(ChatMessage::tool(call.id.as_str(), content));
        }
    }

    fn finish_turn(&self, outcome: LoopOutcome) -> ChatResponse {
        match outcome.completion {
            Completion::Failed => ChatResponse {
                answer: GENERIC_FAILURE.to_string(),
                sources: Vec::new(),
                tasks: Vec::new(),
                incomplete: false,
                tool_calls: outcome.tool_calls,
            },
            Completion::Final => {
                let parsed = extract_tasks(outcome.final_text.as_deref().unwrap_or_default());
                ChatResponse {
                    answer: parsed.answer,
                    sources: outcome.sources,
                    tasks: parsed.tasks,
                    incomplete: false,
                    tool_calls: outcome.tool_calls,
                }
            }
            Completion::IterationLimit => {
                let parsed = outcome.last_text.as_deref().map(extract_tasks);
                let (answer, tasks) = match parsed {
                    Some(p) if !p.answer.is_empty() => (p.answer, p.tasks),
                    _ => (INCOMPLETE_ANSWER.to_string(), Vec::new()),
                };
                ChatResponse {
                    answer,
                    sources: outcome.sources,
                    tasks,
                    incomplete: true,
                    tool_calls: outcome.tool_calls,
                }
            }
        }
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<ConversationTurn>, AgentError> {
        Ok(self.store.history(user_id).await?)
    }

    /// Remove the user's most recent exchange. Returns false when the
    /// history was already empty.
    pub async fn delete_last_exchange(&self, user_id: &str) -> Result<bool, AgentError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let removed = self.store.delete_last_exchange(user_id).await?;
        debug!(user = user_id, removed, "delete last exchange");
        Ok(removed)
    }

    pub async fn reset(&self, user_id: &str) -> Result<(), AgentError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.store.clear_user(user_id).await?;
        Ok(())
    }

    pub async fn reset_all(&self) -> Result<(), AgentError> {
        self.store.clear_all().await?;
        info!("cleared all conversations");
        Ok(())
    }
}

fn turn_message(turn: &ConversationTurn) -> ChatMessage {
    match turn.role {
        Role::User => ChatMessage::user(turn.content.as_str()),
        Role::Assistant => ChatMessage::assistant(turn.content.as_str()),
    }
}
