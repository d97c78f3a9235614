//! Text embedding providers.
//!
//! Every provider implements [`Embedder`]: one vector per input, in input
//! order, all of the dimension fixed at construction.

mod http;
mod onnx;
mod openai;

pub use http::HttpEmbedder;
pub use onnx::OnnxEmbedder;
pub use openai::OpenAiEmbedder;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingProvider};

pub type Embedding = Vec<f32>;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts with a single provider request.
    ///
    /// An empty slice returns an empty vector without contacting the provider.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Embed a search query. Providers that distinguish queries from
    /// documents override this.
    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn dimension(&self) -> usize;

    /// Model identifier, for status output.
    fn model(&self) -> &str;
}

/// Build the embedder selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::OpenAi => Arc::new(OpenAiEmbedder::new(config)?),
        EmbeddingProvider::Http => Arc::new(HttpEmbedder::new(config)?),
        EmbeddingProvider::Onnx => Arc::new(OnnxEmbedder::load(config)?),
    };
    Ok(embedder)
}

/// Reject blank inputs before they reach a provider.
pub(crate) fn check_inputs(texts: &[String]) -> Result<(), EmbeddingError> {
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(EmbeddingError::InvalidInput(format!(
            "input {pos} is empty"
        )));
    }
    Ok(())
}

/// Verify the provider returned one vector of the expected dimension per input.
pub(crate) fn check_output(
    expected_count: usize,
    dimension: usize,
    vectors: Vec<Embedding>,
) -> Result<Vec<Embedding>, EmbeddingError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected dimension {}, got {}",
            dimension,
            bad.len()
        )));
    }
    Ok(vectors)
}

pub(crate) fn map_send_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout
    } else if e.is_connect() {
        EmbeddingError::Connection(e.to_string())
    } else {
        EmbeddingError::Request(e)
    }
}

pub(crate) fn map_status(status: StatusCode, body: String) -> EmbeddingError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::PAYLOAD_TOO_LARGE => {
            EmbeddingError::InvalidInput(format!("status {}: {}", status, body))
        }
        _ => EmbeddingError::Server { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Retryable;

    #[test]
    fn test_check_inputs_rejects_blank() {
        assert!(check_inputs(&["wheat".into(), "barley".into()]).is_ok());
        assert!(matches!(
            check_inputs(&["wheat".into(), "  ".into()]),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_check_output_count_and_dimension() {
        assert!(check_output(2, 3, vec![vec![0.0; 3], vec![1.0; 3]]).is_ok());
        assert!(matches!(
            check_output(2, 3, vec![vec![0.0; 3]]),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            check_output(1, 3, vec![vec![0.0; 4]]),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        let err = map_status(StatusCode::BAD_REQUEST, "empty input".into());
        assert!(matches!(err, EmbeddingError::InvalidInput(_)));
        assert!(!err.is_retryable());

        let err = map_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded".into());
        assert!(err.is_retryable());

        let err = map_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(err.is_retryable());

        let err = map_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(matches!(err, EmbeddingError::Server { .. }));
        assert!(err.is_retryable());

        let err = map_status(StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(!err.is_retryable());
    }
}
