//! Per-user conversation history with bounded FIFO retention.

mod memory;
mod sqlite;

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConversationError;
use crate::models::{Config, ConversationDriver, ConversationTurn, Role};

pub const DEFAULT_MAX_TURNS: usize = 20;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Turns for `user_id`, oldest first. Unknown users have an empty history.
    async fn history(&self, user_id: &str) -> Result<Vec<ConversationTurn>, ConversationError>;

    /// Append a user turn and the assistant's reply, evicting the oldest
    /// turns beyond [`ConversationStore::max_turns`].
    async fn append_exchange(
        &self,
        user_id: &str,
        user: ConversationTurn,
        assistant: ConversationTurn,
    ) -> Result<(), ConversationError>;

    /// Remove the trailing user/assistant pair. Returns false when there was
    /// nothing to remove.
    async fn delete_last_exchange(&self, user_id: &str) -> Result<bool, ConversationError>;

    async fn clear_user(&self, user_id: &str) -> Result<(), ConversationError>;

    async fn clear_all(&self) -> Result<(), ConversationError>;

    fn max_turns(&self) -> usize;
}

/// Open the store selected by `conversation.driver`.
pub fn create_store(config: &Config) -> Result<Arc<dyn ConversationStore>, ConversationError> {
    let max_turns = config.conversation.max_turns as usize;
    let store: Arc<dyn ConversationStore> = match config.conversation.driver {
        ConversationDriver::Memory => Arc::new(InMemoryConversationStore::new(max_turns)),
        ConversationDriver::Sqlite => Arc::new(SqliteConversationStore::open(
            &config.conversation_path(),
            max_turns,
        )?),
    };
    Ok(store)
}

/// How many trailing turns form the last exchange: the final assistant turn
/// plus the user turn right before it, or a lone trailing user turn.
pub(crate) fn last_exchange_len(turns: &[ConversationTurn]) -> usize {
    match turns {
        [.., prev, last] if last.role == Role::Assistant && prev.role == Role::User => 2,
        [.., _] => 1,
        [] => 0,
    }
}

fn check_exchange(user: &ConversationTurn, assistant: &ConversationTurn) -> Result<(), ConversationError> {
    if user.role != Role::User || assistant.role != Role::Assistant {
        return Err(ConversationError::InvalidTurn(format!(
            "expected user then assistant, got {} then {}",
            user.role, assistant.role
        )));
    }
    Ok(())
}
