//! Retrieval results and output formats.

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Ranked chunks with parallel scores and the distinct sources they came from.
///
/// `chunks[i]` scored `scores[i]`; scores never increase along the sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub scores: Vec<f32>,
    /// Source identifiers in first-seen order, without duplicates.
    pub citations: Vec<String>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from already-ranked pairs.
    pub fn from_ranked(ranked: Vec<(Chunk, f32)>) -> Self {
        let mut result = Self::default();
        for (chunk, score) in ranked {
            let citation = chunk.citation();
            if !result.citations.iter().any(|c| c == citation) {
                result.citations.push(citation.to_string());
            }
            result.chunks.push(chunk);
            result.scores.push(score);
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Chunk, f32)> {
        self.chunks.iter().zip(self.scores.iter().copied())
    }
}
