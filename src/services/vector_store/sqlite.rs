//! Single-file SQLite index.
//!
//! Rows are the source of truth; a copy of every entry is kept in memory for
//! brute-force search. Insertion order is the row id.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use super::similarity::{EntryTable, IndexedChunk, check_dimensions};
use super::{Durability, VectorIndex};
use crate::error::VectorStoreError;
use crate::models::{Chunk, RetrievalResult};
use crate::services::embedding::Embedding;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    chunk_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    sequence_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    vector BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection);
"#;

pub struct SqliteIndex {
    conn: Mutex<Connection>,
    collection: String,
    dimension: usize,
    cache: EntryTable,
    write_gate: AsyncMutex<()>,
}

impl SqliteIndex {
    /// Open (or create) the index file and load `collection` into memory.
    ///
    /// Fails with `DimensionMismatch` when the collection was created with a
    /// different dimension, and with `IndexCorruptOrMissing` when the file or
    /// its stored vectors cannot be read.
    pub fn open(path: &Path, collection: &str, dimension: usize) -> Result<Self, VectorStoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                VectorStoreError::IndexCorruptOrMissing(format!("{}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        let stored: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(existing) if existing as usize != dimension => {
                return Err(VectorStoreError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: existing as usize,
                    actual: dimension,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO collections (name, dimension) VALUES (?1, ?2)",
                    params![collection, dimension as i64],
                )?;
            }
        }

        let entries = load_entries(&conn, collection, dimension)?;
        info!(
            path = %path.display(),
            collection,
            entries = entries.len(),
            "opened SQLite vector index"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            dimension,
            cache: EntryTable::from_entries(entries),
            write_gate: AsyncMutex::new(()),
        })
    }
}

fn load_entries(
    conn: &Connection,
    collection: &str,
    dimension: usize,
) -> Result<Vec<IndexedChunk>, VectorStoreError> {
    let mut stmt = conn.prepare(
        "SELECT chunk_id, document_id, sequence_index, text, metadata, vector
         FROM entries WHERE collection = ?1 ORDER BY id",
    )?;

    let rows = stmt.query_map(params![collection], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Vec<u8>>(5)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, document_id, sequence_index, text, metadata, blob) = row?;

        let vector = decode_vector(&blob, dimension).ok_or_else(|| {
            VectorStoreError::IndexCorruptOrMissing(format!(
                "malformed vector for chunk {id} in collection '{collection}'"
            ))
        })?;
        let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata).map_err(|e| {
            VectorStoreError::IndexCorruptOrMissing(format!("malformed metadata for chunk {id}: {e}"))
        })?;

        entries.push(IndexedChunk {
            vector,
            chunk: Chunk {
                id,
                document_id,
                text,
                sequence_index: sequence_index as u32,
                metadata,
            },
        });
    }
    Ok(entries)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8], dimension: usize) -> Option<Vec<f32>> {
    if blob.len() != dimension * 4 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

#[async_trait]
impl VectorIndex for SqliteIndex {
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

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO entries
                     (collection, chunk_id, document_id, sequence_index, text, metadata, vector)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for entry in &batch {
                    let metadata = serde_json::to_string(&entry.chunk.metadata)
                        .map_err(|e| VectorStoreError::Storage(e.to_string()))?;
                    stmt.execute(params![
                        self.collection,
                        entry.chunk.id,
                        entry.chunk.document_id,
                        i64::from(entry.chunk.sequence_index),
                        entry.chunk.text,
                        metadata,
                        encode_vector(&entry.vector),
                    ])?;
                }
            }
            tx.commit()?;
        }

        debug!(collection = %self.collection, added = batch.len(), "committed index batch");
        self.cache.publish(batch);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult, VectorStoreError> {
        check_dimensions(&self.collection, self.dimension, [query])?;
        Ok(self.cache.search(query, top_k))
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.cache.len())
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        let _gate = self.write_gate.lock().await;
        self.conn.lock().execute(
            "DELETE FROM entries WHERE collection = ?1",
            params![self.collection],
        )?;
        self.cache.clear();
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

    fn entry(doc_id: &str, idx: u32, vector: Vec<f32>) -> (Embedding, Chunk) {
        let doc = Document::new(doc_id, "text").with_metadata(meta::FILENAME, format!("{doc_id}.md"));
        (vector, Chunk::from_document(&doc, format!("{doc_id} part {idx}"), idx))
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite3");

        {
            let index = SqliteIndex::open(&path, "kb", 3).unwrap();
            index
                .add(vec![
                    entry("maize", 0, vec![1.0, 0.0, 0.0]),
                    entry("wheat", 0, vec![0.0, 1.0, 0.0]),
                ])
                .await
                .unwrap();
        }

        let index = SqliteIndex::open(&path, "kb", 3).unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        let result = index.search(&[0.9, 0.1, 0.0], 1).await.unwrap();
        assert_eq!(result.chunks[0].document_id, "maize");
        assert_eq!(result.chunks[0].citation(), "maize.md");
        assert_eq!(result.citations, vec!["maize.md"]);
    }

    #[tokio::test]
    async fn test_reopen_with_other_dimension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite3");
        drop(SqliteIndex::open(&path, "kb", 3).unwrap());

        let err = SqliteIndex::open(&path, "kb", 4).err().unwrap();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch { expected: 3, actual: 4, .. }
        ));

        // Other collections in the same file are independent.
        assert!(SqliteIndex::open(&path, "other", 4).is_ok());
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite3");
        std::fs::write(&path, vec![0x5a; 4096]).unwrap();

        let err = SqliteIndex::open(&path, "kb", 3).err().unwrap();
        assert!(matches!(err, VectorStoreError::IndexCorruptOrMissing(_)));
    }

    #[test]
    fn test_malformed_vector_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite3");
        drop(SqliteIndex::open(&path, "kb", 3).unwrap());

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO entries
             (collection, chunk_id, document_id, sequence_index, text, metadata, vector)
             VALUES ('kb', 'c1', 'd1', 0, 'text', '{}', x'0000')",
            [],
        )
        .unwrap();
        drop(conn);

        let err = SqliteIndex::open(&path, "kb", 3).err().unwrap();
        assert!(matches!(err, VectorStoreError::IndexCorruptOrMissing(_)));
    }

    #[tokio::test]
    async fn test_clear_removes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite3");

        let index = SqliteIndex::open(&path, "kb", 2).unwrap();
        index.add(vec![entry("oats", 0, vec![1.0, 1.0])]).await.unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        drop(index);

        let index = SqliteIndex::open(&path, "kb", 2).unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[test]
    fn test_vector_blob_encoding() {
        let blob = encode_vector(&[1.5, -2.0]);
        assert_eq!(blob.len(), 8);
        assert_eq!(decode_vector(&blob, 2), Some(vec![1.5, -2.0]));
        assert_eq!(decode_vector(&blob, 3), None);
    }
}
