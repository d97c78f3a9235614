//! Brute-force cosine ranking shared by the local backends.

use parking_lot::RwLock;

use crate::error::VectorStoreError;
use crate::models::{Chunk, RetrievalResult};

/// Scale `v` to unit length. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Dot product; equals cosine similarity when both inputs are unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Reject a batch when any vector's length differs from the collection's.
pub fn check_dimensions<'a>(
    collection: &str,
    expected: usize,
    vectors: impl IntoIterator<Item = &'a [f32]>,
) -> Result<(), VectorStoreError> {
    if let Some(bad) = vectors.into_iter().find(|v| v.len() != expected) {
        return Err(VectorStoreError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// A stored chunk with its unit-length vector.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl IndexedChunk {
    pub fn new(vector: &[f32], chunk: Chunk) -> Self {
        Self {
            vector: normalize(vector),
            chunk,
        }
    }
}

/// Entries in insertion order behind a read/write lock.
///
/// Readers search concurrently; a whole batch is appended under a single
/// write lock so it becomes visible at once.
#[derive(Debug, Default)]
pub struct EntryTable {
    entries: RwLock<Vec<IndexedChunk>>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<IndexedChunk>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn publish(&self, batch: Vec<IndexedChunk>) {
        self.entries.write().extend(batch);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Rank every entry against `query` and keep the best `top_k`.
    ///
    /// Scores never increase along the result; equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> RetrievalResult {
        if top_k == 0 {
            return RetrievalResult::empty();
        }

        let query = normalize(query);
        let entries = self.entries.read();

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, dot(&e.vector, &query)))
            .collect();

        // sort_by is stable, which keeps ties in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        RetrievalResult::from_ranked(
            scored
                .into_iter()
                .map(|(i, score)| (entries[i].chunk.clone(), score.clamp(-1.0, 1.0)))
                .collect(),
        )
    }
}

/// Re-sort externally ranked hits so ties follow insertion order.
pub fn stable_rank(mut hits: Vec<(u64, Chunk, f32)>, top_k: usize) -> RetrievalResult {
    hits.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
    hits.truncate(top_k);
    RetrievalResult::from_ranked(hits.into_iter().map(|(_, c, s)| (c, s)).collect())
}
