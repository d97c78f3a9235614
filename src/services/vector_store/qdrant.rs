//! Qdrant vector index backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder, point_id::PointIdOptions, vectors_config,
};
use tokio::sync::Mutex;
use tracing::info;

use super::similarity::{check_dimensions, normalize, stable_rank};
use super::{Durability, VectorIndex};
use crate::error::VectorStoreError;
use crate::models::{Chunk, RetrievalResult, VectorStoreConfig};
use crate::services::embedding::Embedding;

/// Entries live in an external Qdrant collection with cosine distance.
///
/// Point ids are a running sequence number so that duplicates are kept and
/// ties can be ordered by insertion.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
    next_id: AtomicU64,
    write_gate: Mutex<()>,
}

impl QdrantIndex {
    pub async fn connect(
        config: &VectorStoreConfig,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        let index = Self {
            client,
            collection: config.collection.clone(),
            dimension,
            next_id: AtomicU64::new(0),
            write_gate: Mutex::new(()),
        };
        index.ensure_collection().await?;

        let existing = index.count().await? as u64;
        index.next_id.store(existing, Ordering::SeqCst);
        info!(url = %config.url, collection = %index.collection, entries = existing, "connected to Qdrant");

        Ok(index)
    }

    /// Create the collection when absent; verify its dimension when present.
    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => {
                let size = info
                    .result
                    .and_then(|r| r.config)
                    .and_then(|c| c.params)
                    .and_then(|p| p.vectors_config)
                    .and_then(|v| v.config)
                    .and_then(|c| match c {
                        vectors_config::Config::Params(params) => Some(params.size as usize),
                        _ => None,
                    });

                match size {
                    Some(size) if size != self.dimension => {
                        Err(VectorStoreError::DimensionMismatch {
                            collection: self.collection.clone(),
                            expected: size,
                            actual: self.dimension,
                        })
                    }
                    _ => Ok(()),
                }
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    self.create_collection().await
                } else {
                    Err(VectorStoreError::Connection(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        Ok(())
    }
}

fn chunk_payload(chunk: Chunk) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("chunk_id".to_string(), chunk.id.into());
    payload.insert("document_id".to_string(), chunk.document_id.into());
    payload.insert(
        "sequence_index".to_string(),
        i64::from(chunk.sequence_index).into(),
    );
    payload.insert("text".to_string(), chunk.text.into());
    let metadata = serde_json::to_string(&chunk.metadata).unwrap_or_else(|_| "{}".to_string());
    payload.insert("metadata".to_string(), metadata.into());
    payload
}

fn payload_str<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.as_str()),
        _ => None,
    })
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Result<Chunk, VectorStoreError> {
    let missing = |key: &str| VectorStoreError::Search(format!("point payload lacks '{key}'"));

    let sequence_index = payload
        .get("sequence_index")
        .and_then(|v| match &v.kind {
            Some(Kind::IntegerValue(n)) => Some(*n as u32),
            _ => None,
        })
        .ok_or_else(|| missing("sequence_index"))?;

    let metadata = payload_str(payload, "metadata")
        .map(serde_json::from_str::<BTreeMap<String, String>>)
        .transpose()
        .map_err(|e| VectorStoreError::Search(e.to_string()))?
        .unwrap_or_default();

    Ok(Chunk {
        id: payload_str(payload, "chunk_id")
            .ok_or_else(|| missing("chunk_id"))?
            .to_string(),
        document_id: payload_str(payload, "document_id")
            .ok_or_else(|| missing("document_id"))?
            .to_string(),
        text: payload_str(payload, "text")
            .ok_or_else(|| missing("text"))?
            .to_string(),
        sequence_index,
        metadata,
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
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
        let first_id = self.next_id.load(Ordering::SeqCst);
        let count = entries.len() as u64;

        let points: Vec<PointStruct> = entries
            .into_iter()
            .zip(first_id..)
            .map(|((vector, chunk), id)| PointStruct::new(id, normalize(&vector), chunk_payload(chunk)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorStoreError::Storage(e.to_string()))?;

        self.next_id.store(first_id + count, Ordering::SeqCst);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult, VectorStoreError> {
        check_dimensions(&self.collection, self.dimension, [query])?;
        if top_k == 0 {
            return Ok(RetrievalResult::empty());
        }

        let request = SearchPointsBuilder::new(&self.collection, query.to_vec(), top_k as u64)
            .with_payload(true);

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let seq = match point.id.and_then(|id| id.point_id_options) {
                Some(PointIdOptions::Num(n)) => n,
                _ => u64::MAX,
            };
            let chunk = chunk_from_payload(&point.payload)?;
            hits.push((seq, chunk, point.score.clamp(-1.0, 1.0)));
        }

        Ok(stable_rank(hits, top_k))
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        Ok(response.result.map_or(0, |r| r.count as usize))
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        let _gate = self.write_gate.lock().await;

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        self.create_collection().await?;
        self.next_id.store(0, Ordering::SeqCst);

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn durability(&self) -> Durability {
        Durability::Persistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, meta};

    #[test]
    fn test_payload_round_trip_keeps_metadata() {
        let doc = Document::new("maize-guide", "text")
            .with_metadata(meta::FILENAME, "maize_guide.md")
            .with_metadata(meta::CATEGORY, "maize_cultivation");
        let chunk = Chunk::from_document(&doc, "Irrigate weekly.".to_string(), 3);

        let restored = chunk_from_payload(&chunk_payload(chunk.clone())).unwrap();
        assert_eq!(restored, chunk);
    }

    #[test]
    fn test_payload_without_text_is_rejected() {
        let doc = Document::new("d", "text");
        let mut payload = chunk_payload(Chunk::from_document(&doc, "t".to_string(), 0));
        payload.remove("text");

        assert!(matches!(
            chunk_from_payload(&payload),
            Err(VectorStoreError::Search(_))
        ));
    }
}
