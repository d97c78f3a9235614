//! Ephemeral in-memory index.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::similarity::{EntryTable, IndexedChunk, check_dimensions};
use super::{Durability, VectorIndex};
use crate::error::VectorStoreError;
use crate::models::{Chunk, RetrievalResult};
use crate::services::embedding::Embedding;

/// Brute-force cosine index held entirely in process memory.
pub struct MemoryIndex {
    collection: String,
    dimension: usize,
    table: EntryTable,
    write_gate: Mutex<()>,
}

impl MemoryIndex {
    pub fn new(collection: impl Into<String>, dimension: usize) -> Self {
        Self {
            collection: collection.into(),
            dimension,
            table: EntryTable::new(),
            write_gate: Mutex::new(()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, entries: Vec<(Embedding, Chunk)>) -> Result<(), VectorStoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        check_dimensions(
            &self.collection,
            self.dimension,
            entries.iter().map(|(v, _)| v.as_slice()),
        )?;

        let _gate = self.write_gate.lock().await;
        let batch: Vec<IndexedChunk> = entries
            .into_iter()
            .map(|(vector, chunk)| IndexedChunk::new(&vector, chunk))
            .collect();
        self.table.publish(batch);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult, VectorStoreError> {
        check_dimensions(&self.collection, self.dimension, [query])?;
        Ok(self.table.search(query, top_k))
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.table.len())
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        let _gate = self.write_gate.lock().await;
        self.table.clear();
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn durability(&self) -> Durability {
        Durability::Ephemeral
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::Document;

    fn entry(doc_id: &str, vector: Vec<f32>) -> (Embedding, Chunk) {
        let doc = Document::new(doc_id, "text");
        (vector, Chunk::from_document(&doc, doc_id.to_string(), 0))
    }

    #[tokio::test]
    async fn test_self_similarity_is_one() {
        let index = MemoryIndex::new("kb", 3);
        index
            .add(vec![
                entry("a", vec![0.2, 0.5, 0.1]),
                entry("b", vec![-1.0, 0.0, 0.3]),
            ])
            .await
            .unwrap();

        let result = index.search(&[0.2, 0.5, 0.1], 1).await.unwrap();
        assert_eq!(result.chunks[0].document_id, "a");
        assert!((result.scores[0] - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_respects_top_k_and_order() {
        let index = MemoryIndex::new("kb", 2);
        let entries = (0..20)
            .map(|i| entry(&format!("d{i}"), vec![1.0, i as f32 / 10.0]))
            .collect();
        index.add(entries).await.unwrap();

        let result = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(result.len(), 5);
        assert!(result.scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(result.chunks[0].document_id, "d0");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejects_whole_batch() {
        let index = MemoryIndex::new("kb", 2);
        let err = index
            .add(vec![entry("ok", vec![1.0, 0.0]), entry("bad", vec![1.0])])
            .await
            .unwrap_err();

        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicates_are_kept_and_clear_empties() {
        let index = MemoryIndex::new("kb", 2);
        index.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        index.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_and_searches() {
        let index = Arc::new(MemoryIndex::new("kb", 2));
        let mut handles = Vec::new();

        for i in 0..8 {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                index
                    .add(vec![entry(&format!("w{i}"), vec![1.0, i as f32])])
                    .await
                    .unwrap();
                index.search(&[1.0, 0.0], 3).await.unwrap().len()
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap() >= 1);
        }
        assert_eq!(index.count().await.unwrap(), 8);
    }
}
