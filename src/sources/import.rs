//! Bulk document import from JSON.
//!
//! Accepts a JSON array of records, an object with a `documents` array, or
//! JSON Lines. Each record is `{"doc_id"?, "text", "metadata"?}`.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::SourceError;
use crate::models::{Document, meta};
use crate::services::category::CategoryClassifier;

#[derive(Debug, Deserialize)]
struct ImportRecord {
    #[serde(default, alias = "id")]
    doc_id: Option<String>,
    text: String,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ImportEnvelope {
    documents: Vec<ImportRecord>,
}

pub fn parse_documents(input: &str, classifier: &CategoryClassifier) -> Result<Vec<Document>, SourceError> {
    let trimmed = input.trim_start();
    let records: Vec<ImportRecord> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else if trimmed.starts_with('{') && serde_json::from_str::<ImportEnvelope>(trimmed).is_ok() {
        serde_json::from_str::<ImportEnvelope>(trimmed)?.documents
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };

    let total = records.len();
    let documents: Vec<Document> = records
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .map(|r| into_document(r, classifier))
        .collect();

    debug!(records = total, documents = documents.len(), "parsed import");
    Ok(documents)
}

pub fn read_documents<R: Read>(mut reader: R, classifier: &CategoryClassifier) -> Result<Vec<Document>, SourceError> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;
    parse_documents(&input, classifier)
}

fn into_document(record: ImportRecord, classifier: &CategoryClassifier) -> Document {
    let mut doc = match record.doc_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => Document::new(id, record.text),
        None => Document::from_text(record.text),
    };

    for (key, value) in record.metadata {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        doc.metadata.insert(key, value);
    }

    if !doc.metadata.contains_key(meta::CATEGORY) {
        let name = doc
            .metadata
            .get(meta::FILENAME)
            .cloned()
            .unwrap_or_else(|| doc.id.clone());
        let category = classifier.classify(&name).to_string();
        doc.metadata.insert(meta::CATEGORY.to_string(), category);
    }

    doc
}
