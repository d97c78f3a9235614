//! Error types for the Cresco RAG core.

use reqwest::StatusCode;
use thiserror::Error;

use crate::utils::retry::Retryable;

/// 5xx and 429 are worth another attempt.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    Connection(String),

    #[error("embedding provider error: status {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding provider rejected input: {0}")]
    InvalidInput(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Connection(_) | EmbeddingError::Timeout => true,
            EmbeddingError::Server { status, .. } => is_transient_status(*status),
            EmbeddingError::Request(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidInput(_)
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::Model(_) => false,
        }
    }
}

/// Errors raised by the language model provider.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to connect to model provider: {0}")]
    Connection(String),

    #[error("model provider error: status {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model call timed out")]
    Timeout,

    #[error("failed to load local model: {0}")]
    Load(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("inference error: {0}")]
    Inference(String),
}

impl Retryable for ModelError {
    fn is_retryable(&self) -> bool {
        match self {
            ModelError::Connection(_) | ModelError::Timeout => true,
            ModelError::Server { status, .. } => is_transient_status(*status),
            ModelError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Errors raised by the external web-search provider.
#[derive(Debug, Error)]
pub enum SearchProviderError {
    #[error("failed to connect to search provider: {0}")]
    Connection(String),

    #[error("search provider error: status {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid search response: {0}")]
    InvalidResponse(String),

    #[error("search provider is not configured: {0}")]
    NotConfigured(String),
}

impl Retryable for SearchProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchProviderError::Connection(_) => true,
            SearchProviderError::Server { status, .. } => is_transient_status(*status),
            SearchProviderError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Errors related to vector index operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector index is corrupt or missing: {0}")]
    IndexCorruptOrMissing(String),

    #[error(
        "embedding dimension mismatch in collection '{collection}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("failed to connect to vector database: {0}")]
    Connection(String),

    #[error("collection error: {0}")]
    Collection(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("search error: {0}")]
    Search(String),
}

impl From<rusqlite::Error> for VectorStoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                VectorStoreError::IndexCorruptOrMissing(e.to_string())
            }
            other => VectorStoreError::Storage(other.to_string()),
        }
    }
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::Connection(_) => true,
            VectorStoreError::Collection(msg)
            | VectorStoreError::Storage(msg)
            | VectorStoreError::Search(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("connection")
                    || lower.contains("unavailable")
                    || lower.contains("locked")
            }
            VectorStoreError::IndexCorruptOrMissing(_)
            | VectorStoreError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors related to indexing operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding batch failed after {chunks_added} chunks were added: {source}")]
    BatchFailed {
        chunks_added: usize,
        #[source]
        source: EmbeddingError,
    },

    #[error("vector store error after {chunks_added} chunks were added: {source}")]
    Store {
        chunks_added: usize,
        #[source]
        source: VectorStoreError,
    },

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

impl IndexError {
    /// Chunks that were durably added before the failure.
    pub fn chunks_added(&self) -> usize {
        match self {
            IndexError::BatchFailed { chunks_added, .. } | IndexError::Store { chunks_added, .. } => {
                *chunks_added
            }
            IndexError::VectorStore(_) => 0,
        }
    }
}

/// Errors related to retrieval.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors raised while invoking a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool {tool} failed: {reason}")]
    Failed { tool: String, reason: String },

    #[error("tool {0} timed out")]
    Timeout(String),
}

/// The trailing task block was present but could not be decoded.
#[derive(Debug, Error)]
#[error("malformed task block: {0}")]
pub struct TaskBlockError(pub String);

/// Errors related to conversation persistence.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation storage error: {0}")]
    Storage(String),

    #[error("stored conversation turn is invalid: {0}")]
    InvalidTurn(String),
}

impl From<rusqlite::Error> for ConversationError {
    fn from(e: rusqlite::Error) -> Self {
        ConversationError::Storage(e.to_string())
    }
}

/// Errors surfaced by the agent loop.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("request was abandoned before completion")]
    Cancelled,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to document sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk error: {0}")]
    Walk(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("knowledge base not found: {0}")]
    NotFound(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::Connection("refused".into()).is_retryable());
        let server = |status: StatusCode| EmbeddingError::Server {
            status,
            body: "busy".into(),
        };
        assert!(server(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(server(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(server(StatusCode::HTTP_VERSION_NOT_SUPPORTED).is_retryable());
        assert!(server(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!server(StatusCode::NOT_FOUND).is_retryable());
        assert!(!EmbeddingError::InvalidInput("empty string".into()).is_retryable());
    }

    #[test]
    fn test_vector_store_fatal_errors_not_retryable() {
        assert!(!VectorStoreError::IndexCorruptOrMissing("bad".into()).is_retryable());
        let mismatch = VectorStoreError::DimensionMismatch {
            collection: "kb".into(),
            expected: 3,
            actual: 4,
        };
        assert!(!mismatch.is_retryable());
        assert!(mismatch.to_string().contains("expected 3, got 4"));
    }

    #[test]
    fn test_index_error_reports_partial_progress() {
        let err = IndexError::BatchFailed {
            chunks_added: 200,
            source: EmbeddingError::Timeout,
        };
        assert_eq!(err.chunks_added(), 200);
        assert!(err.to_string().contains("200"));
    }
}
