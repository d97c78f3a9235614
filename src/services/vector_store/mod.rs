//! Vector index abstraction layer.
//!
//! A [`VectorIndex`] holds `(embedding, chunk)` pairs for one named
//! collection and answers cosine nearest-neighbor queries. Backends are
//! selected by `vector_store.driver`:
//!
//! - `sqlite`: single-file index, cached in memory for brute-force search
//! - `qdrant`: external Qdrant collection
//! - `memory`: ephemeral, lost on restart

mod memory;
mod qdrant;
mod similarity;
mod sqlite;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;
pub use similarity::{EntryTable, IndexedChunk, check_dimensions, dot, normalize};
pub use sqlite::SqliteIndex;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::VectorStoreError;
use crate::models::{Chunk, Config, RetrievalResult, VectorDriver};
use crate::services::embedding::Embedding;

/// Whether entries survive a process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Persistent,
    Ephemeral,
}

impl std::fmt::Display for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Durability::Persistent => write!(f, "persistent"),
            Durability::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries. Every vector must match [`VectorIndex::dimension`];
    /// otherwise nothing is written.
    async fn add(&self, entries: Vec<(Embedding, Chunk)>) -> Result<(), VectorStoreError>;

    /// Up to `top_k` entries by descending cosine similarity, ties in
    /// insertion order.
    async fn search(&self, query: &[f32], top_k: usize)
    -> Result<RetrievalResult, VectorStoreError>;

    async fn count(&self) -> Result<usize, VectorStoreError>;

    /// Remove every entry from the collection.
    async fn clear(&self) -> Result<(), VectorStoreError>;

    fn collection(&self) -> &str;

    fn dimension(&self) -> usize;

    fn durability(&self) -> Durability;
}

/// Open the backend selected in `config` for vectors of `dimension`.
pub async fn create_index(
    config: &Config,
    dimension: usize,
) -> Result<Arc<dyn VectorIndex>, VectorStoreError> {
    let collection = config.vector_store.collection.as_str();

    let index: Arc<dyn VectorIndex> = match config.vector_store.driver {
        VectorDriver::Sqlite => Arc::new(SqliteIndex::open(
            &config.index_path(),
            collection,
            dimension,
        )?),
        VectorDriver::Qdrant => {
            Arc::new(QdrantIndex::connect(&config.vector_store, dimension).await?)
        }
        VectorDriver::Memory => {
            warn!(
                collection,
                "using in-memory vector index; indexed documents are lost on restart"
            );
            Arc::new(MemoryIndex::new(collection, dimension))
        }
    };

    Ok(index)
}
