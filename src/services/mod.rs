pub mod category;
pub mod chunker;
pub mod conversation;
pub mod embedding;
pub mod indexer;
pub mod retriever;
pub mod vector_store;

pub use category::CategoryClassifier;
pub use chunker::TextChunker;
pub use conversation::{
    ConversationStore, InMemoryConversationStore, SqliteConversationStore, create_store,
};
pub use embedding::{Embedder, Embedding, HttpEmbedder, OnnxEmbedder, OpenAiEmbedder, create_embedder};
pub use indexer::{IndexOutcome, Indexer};
pub use retriever::Retriever;
pub use vector_store::{
    Durability, MemoryIndex, QdrantIndex, SqliteIndex, VectorIndex, create_index,
};
