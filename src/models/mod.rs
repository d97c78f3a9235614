mod config;
mod conversation;
mod document;
mod search;
mod task;

pub use config::{
    AgentConfig, CategoryConfig, CategoryRule, ChunkMode, Config, ConversationConfig,
    ConversationDriver, DEFAULT_CHAT_MODEL, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_URL, DEFAULT_QDRANT_URL, DEFAULT_TAVILY_URL,
    EmbeddingConfig, EmbeddingProvider, IndexingConfig, LlmConfig, RetrySettings, SearchConfig,
    VectorDriver, VectorStoreConfig, WebSearchConfig,
};
pub use conversation::{ConversationTurn, Role};
pub use document::{Chunk, Document, meta};
pub use search::{OutputFormat, RetrievalResult};
pub use task::{PlannerTask, Priority};
