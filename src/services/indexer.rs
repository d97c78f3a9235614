//! Document ingestion: chunk, embed in rate-limited batches, store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::vector_store::VectorIndex;
use crate::error::{ConfigError, IndexError};
use crate::models::{Chunk, Config, Document};
use crate::utils::retry::{RetryConfig, with_retry};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Result of [`Indexer::index_corpus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The collection already held this many entries; nothing was embedded.
    AlreadyIndexed(usize),
    Indexed { documents: usize, chunks: usize },
}

impl IndexOutcome {
    /// Entries in the collection after the call.
    pub fn entries(&self) -> usize {
        match self {
            IndexOutcome::AlreadyIndexed(count) => *count,
            IndexOutcome::Indexed { chunks, .. } => *chunks,
        }
    }
}

pub struct Indexer {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    batch_delay: Duration,
    retry: RetryConfig,
}

impl Indexer {
    pub fn new(chunker: TextChunker, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            chunker,
            embedder,
            index,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(TextChunker::from_config(&config.indexing)?, embedder, index)
            .with_batch_size(config.indexing.batch_size as usize)
            .with_batch_delay(Duration::from_millis(config.indexing.batch_delay_ms))
            .with_retry(RetryConfig::from(&config.retry)))
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Chunk, embed and store `documents`, returning the number of chunks added.
    pub async fn ingest(&self, documents: &[Document]) -> Result<usize, IndexError> {
        self.ingest_with_progress(documents, |_, _| {}).await
    }

    /// Like [`Indexer::ingest`], reporting `(chunks_added, chunks_total)`
    /// after every stored batch.
    pub async fn ingest_with_progress<F>(
        &self,
        documents: &[Document],
        on_batch: F,
    ) -> Result<usize, IndexError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| self.chunker.split(doc))
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();

        let total = chunks.len();
        if total == 0 {
            debug!(documents = documents.len(), "no chunks to index");
            return Ok(0);
        }

        let batches = total.div_ceil(self.batch_size);
        info!(
            documents = documents.len(),
            chunks = total,
            batches,
            collection = self.index.collection(),
            "indexing documents"
        );

        let mut chunks_added = 0;
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            if batch_no > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = with_retry(&self.retry, || self.embedder.embed(&texts))
                .await
                .into_result()
                .map_err(|source| {
                    warn!(batch = batch_no + 1, chunks_added, error = %source, "embedding batch failed");
                    IndexError::BatchFailed {
                        chunks_added,
                        source,
                    }
                })?;

            let entries = vectors.into_iter().zip(batch.iter().cloned()).collect();
            self.index
                .add(entries)
                .await
                .map_err(|source| IndexError::Store {
                    chunks_added,
                    source,
                })?;

            chunks_added += batch.len();
            debug!(batch = batch_no + 1, batches, chunks_added, "stored batch");
            on_batch(chunks_added, total);
        }

        info!(chunks = chunks_added, "indexing complete");
        Ok(chunks_added)
    }

    /// Populate the collection from a corpus.
    ///
    /// Without `force`, a non-empty collection is left untouched. With
    /// `force`, the collection is cleared and rebuilt.
    pub async fn index_corpus(
        &self,
        documents: &[Document],
        force: bool,
    ) -> Result<IndexOutcome, IndexError> {
        self.index_corpus_with_progress(documents, force, |_, _| {})
            .await
    }

    pub async fn index_corpus_with_progress<F>(
        &self,
        documents: &[Document],
        force: bool,
        on_batch: F,
    ) -> Result<IndexOutcome, IndexError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let existing = self.index.count().await?;
        if existing > 0 && !force {
            info!(entries = existing, "collection already indexed, skipping");
            return Ok(IndexOutcome::AlreadyIndexed(existing));
        }
        if force && existing > 0 {
            info!(entries = existing, "clearing collection before re-index");
            self.index.clear().await?;
        }

        let chunks = self.ingest_with_progress(documents, on_batch).await?;
        Ok(IndexOutcome::Indexed {
            documents: documents.len(),
            chunks,
        })
    }
}
