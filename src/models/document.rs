use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata keys set by the loaders and read back for attribution.
pub mod meta {
    pub const FILENAME: &str = "filename";
    pub const PATH: &str = "path";
    pub const CATEGORY: &str = "category";
    pub const CHECKSUM: &str = "checksum";
}

/// A source document, immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A contiguous window of a document's text: the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub sequence_index: u32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Build a document whose id is derived from its content.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Self::generate_id(&text),
            text,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn generate_id(text: &str) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(text.as_bytes());
        hex::encode(&hash[..16])
    }
}

impl Chunk {
    /// Stable id: the same document and position always produce the same id.
    pub fn generate_id(document_id: &str, sequence_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, sequence_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn from_document(document: &Document, text: String, sequence_index: u32) -> Self {
        Self {
            id: Self::generate_id(&document.id, sequence_index),
            document_id: document.id.clone(),
            text,
            sequence_index,
            metadata: document.metadata.clone(),
        }
    }

    /// Source identifier shown to users: the file name when known, else the document id.
    pub fn citation(&self) -> &str {
        self.metadata
            .get(meta::FILENAME)
            .map(String::as_str)
            .unwrap_or(&self.document_id)
    }

    pub fn category(&self) -> &str {
        self.metadata
            .get(meta::CATEGORY)
            .map(String::as_str)
            .unwrap_or("general")
    }
}
