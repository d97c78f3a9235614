use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ConversationStore, check_exchange, last_exchange_len};
use crate::error::ConversationError;
use crate::models::ConversationTurn;

/// Process-local store; histories vanish on restart.
pub struct InMemoryConversationStore {
    threads: RwLock<HashMap<String, VecDeque<ConversationTurn>>>,
    max_turns: usize,
}

impl InMemoryConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_TURNS)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn history(&self, user_id: &str) -> Result<Vec<ConversationTurn>, ConversationError> {
        Ok(self
            .threads
            .read()
            .get(user_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append_exchange(
        &self,
        user_id: &str,
        user: ConversationTurn,
        assistant: ConversationTurn,
    ) -> Result<(), ConversationError> {
        check_exchange(&user, &assistant)?;

        let mut threads = self.threads.write();
        let turns = threads.entry(user_id.to_string()).or_default();
        turns.push_back(user);
        turns.push_back(assistant);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
        Ok(())
    }

    async fn delete_last_exchange(&self, user_id: &str) -> Result<bool, ConversationError> {
        let mut threads = self.threads.write();
        let Some(turns) = threads.get_mut(user_id) else {
            return Ok(false);
        };

        let remove = last_exchange_len(turns.make_contiguous());
        turns.truncate(turns.len() - remove);
        if turns.is_empty() {
            threads.remove(user_id);
        }
        Ok(remove > 0)
    }

    async fn clear_user(&self, user_id: &str) -> Result<(), ConversationError> {
        self.threads.write().remove(user_id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), ConversationError> {
        self.threads.write().clear();
        Ok(())
    }

    fn max_turns(&self) -> usize {
        self.max_turns
    }
}
