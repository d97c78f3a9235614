//! Query-time retrieval: embed the query, search the index, attribute sources.

use std::sync::Arc;

use tracing::debug;

use super::embedding::Embedder;
use super::vector_store::VectorIndex;
use crate::error::SearchError;
use crate::models::RetrievalResult;
use crate::utils::retry::{RetryConfig, with_retry};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
    retry: RetryConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            default_top_k: DEFAULT_TOP_K,
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Blank queries return an empty result without calling the embedder.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<RetrievalResult, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(RetrievalResult::empty());
        }
        let top_k = top_k.unwrap_or(self.default_top_k);

        let vector = with_retry(&self.retry, || self.embedder.embed_query(query))
            .await
            .into_result()?;

        let result = self.index.search(&vector, top_k).await?;
        debug!(
            top_k,
            hits = result.len(),
            best = result.scores.first().copied().unwrap_or_default(),
            "retrieved chunks"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMode, Document};
    use crate::services::chunker::TextChunker;
    use crate::services::indexer::Indexer;
    use crate::services::vector_store::MemoryIndex;
    use crate::test_support::KeywordEmbedder;

    async fn setup(docs: &[Document]) -> (Retriever, Arc<KeywordEmbedder>) {
        let embedder = Arc::new(KeywordEmbedder::new());
        let index = Arc::new(MemoryIndex::new("kb", KeywordEmbedder::DIMENSION));
        let chunker = TextChunker::new(500, 50, ChunkMode::Positional).unwrap();
        Indexer::new(chunker, embedder.clone(), index.clone())
            .ingest(docs)
            .await
            .unwrap();
        (Retriever::new(embedder.clone(), index), embedder)
    }

    #[tokio::test]
    async fn test_maize_question_cites_document() {
        let (retriever, _) = setup(&[
            Document::new("d1", "Irrigate maize fields weekly during dry season."),
            Document::new("d2", "Wheat needs nitrogen at tillering."),
        ])
        .await;

        let result = retriever
            .retrieve("How often should maize be irrigated?", Some(1))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.chunks[0].document_id, "d1");
        assert_eq!(result.citations, vec!["d1"]);
    }

    #[tokio::test]
    async fn test_single_maize_document_is_retrieved() {
        let doc = Document::new("maize-irrigation", "Irrigate maize fields weekly during dry season.");
        let (retriever, embedder) = setup(std::slice::from_ref(&doc)).await;
        assert_eq!(embedder.batch_sizes(), vec![1]);

        let result = retriever
            .retrieve("how often should I water maize", Some(1))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.chunks[0].text, doc.text);
        assert_eq!(result.citations, vec![doc.id.clone()]);
        assert!(result.scores[0] > 0.0);
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedder() {
        let (retriever, embedder) = setup(&[Document::new("d1", "Oat husbandry.")]).await;
        let calls_before = embedder.batch_sizes().len();

        let result = retriever.retrieve("   ", None).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(embedder.batch_sizes().len(), calls_before);
    }

    #[tokio::test]
    async fn test_default_top_k_applies() {
        let docs: Vec<Document> = (0..8)
            .map(|i| Document::new(format!("d{i}"), format!("barley trial {i}")))
            .collect();
        let (retriever, _) = setup(&docs).await;

        let result = retriever.retrieve("barley", None).await.unwrap();
        assert_eq!(result.len(), DEFAULT_TOP_K);
        assert!(result.scores.windows(2).all(|w| w[0] >= w[1]));
    }
}
