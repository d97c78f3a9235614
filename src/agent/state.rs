//! Turn lifecycle as explicit transitions.

use crate::llm::ModelResponse;

/// Why a turn reached [`AgentState::Answering`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The model produced a final answer.
    Final,
    /// The model kept requesting tools until the iteration cap.
    IterationLimit,
    /// The model could not be reached.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingInput,
    Reasoning,
    ToolCall,
    Answering(Completion),
}

/// What the model asked for on one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelDecision {
    CallTools,
    Answer,
    Unavailable,
}

impl From<&ModelResponse> for ModelDecision {
    fn from(response: &ModelResponse) -> Self {
        if response.tool_calls.is_empty() {
            ModelDecision::Answer
        } else {
            ModelDecision::CallTools
        }
    }
}

impl AgentState {
    /// A user message arrived.
    pub fn start(self) -> Self {
        match self {
            AgentState::AwaitingInput => AgentState::Reasoning,
            other => other,
        }
    }

    /// Apply the model's decision. `iterations` counts model invocations made
    /// so far in this turn, including the one that produced `decision`.
    pub fn next(self, decision: ModelDecision, iterations: u32, max_iterations: u32) -> Self {
        match (self, decision) {
            (AgentState::Reasoning, ModelDecision::Unavailable) => {
                AgentState::Answering(Completion::Failed)
            }
            (AgentState::Reasoning, ModelDecision::Answer) => AgentState::Answering(Completion::Final),
            (AgentState::Reasoning, ModelDecision::CallTools) if iterations >= max_iterations => {
                AgentState::Answering(Completion::IterationLimit)
            }
            (AgentState::Reasoning, ModelDecision::CallTools) => AgentState::ToolCall,
            (other, _) => other,
        }
    }

    /// Tool outputs were appended to the working context.
    pub fn tools_done(self) -> Self {
        match self {
            AgentState::ToolCall => AgentState::Reasoning,
            other => other,
        }
    }

    /// The answer was delivered.
    pub fn finish(self) -> Self {
        match self {
            AgentState::Answering(_) => AgentState::AwaitingInput,
            other => other,
        }
    }

    pub fn is_answering(&self) -> bool {
        matches!(self, AgentState::Answering(_))
    }
}
