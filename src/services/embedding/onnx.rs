//! In-process ONNX embedding model.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};
use tracing::info;

use super::{Embedder, Embedding, check_inputs, check_output};
use crate::error::{EmbeddingError, ModelError};
use crate::models::{Config, EmbeddingConfig};

const QUERY_INSTRUCTION: &str =
    "Instruct: Given an agricultural question, retrieve relevant passages\nQuery: ";

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
}

/// Runs a local `model.onnx` + `tokenizer.json` pair on the blocking pool.
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,
    name: String,
}

impl OnnxEmbedder {
    pub fn load(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model_dir = config
            .model_path
            .clone()
            .or_else(|| Config::data_dir().map(|d| d.join("models")))
            .unwrap_or_else(|| PathBuf::from("./models"));

        let model = OnnxModel::load(config, &model_dir)
            .map_err(|e| EmbeddingError::Model(e.to_string()))?;

        info!(model_dir = %model_dir.display(), dimension = model.dimension, "loaded ONNX embedding model");

        Ok(Self {
            model: Arc::new(model),
            name: config.model.clone(),
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Embedding>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(&texts))
            .await
            .map_err(|e| EmbeddingError::Model(e.to_string()))?
            .map_err(|e| EmbeddingError::Model(e.to_string()))
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        check_inputs(texts)?;
        let vectors = self.run(texts.to_vec()).await?;
        check_output(texts.len(), self.model.dimension, vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        check_inputs(&[text.to_string()])?;
        let vectors = self.run(vec![format!("{QUERY_INSTRUCTION}{text}")]).await?;
        check_output(1, self.model.dimension, vectors)?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn dimension(&self) -> usize {
        self.model.dimension
    }

    fn model(&self) -> &str {
        &self.name
    }
}

impl OnnxModel {
    fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let max_tokens = config.max_tokens as usize;

        if !model_path.exists() {
            return Err(ModelError::Load(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ModelError::Load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ModelError::Load(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| ModelError::Load(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ModelError::Load(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension: config.dimension as usize,
        })
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, ModelError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut position_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            for (j, (&id, &m)) in ids.iter().zip(mask.iter()).enumerate() {
                input_ids[i * max_len + j] = id as i64;
                attention_mask[i * max_len + j] = m as i64;
                position_ids[i * max_len + j] = j as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array(([batch_size, max_len], input_ids))
            .map_err(|e: ort::Error| ModelError::Inference(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array(([batch_size, max_len], attention_mask))
            .map_err(|e: ort::Error| ModelError::Inference(e.to_string()))?;
        let position_ids_tensor = Tensor::from_array(([batch_size, max_len], position_ids))
            .map_err(|e: ort::Error| ModelError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                input_ids_tensor,
                attention_mask_tensor,
                position_ids_tensor
            ])
            .map_err(|e: ort::Error| ModelError::Inference(e.to_string()))?;

        let output: ArrayViewD<'_, f32> = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| ModelError::Inference(e.to_string()))?;

        let shape = output.shape();
        let width = *shape.last().unwrap_or(&0);
        if width < self.dimension {
            return Err(ModelError::Inference(format!(
                "model produces {} dimensions, configured {}",
                width, self.dimension
            )));
        }

        // Last-token pooling for sequence outputs, direct rows for pooled outputs.
        let embeddings = match shape.len() {
            3 => (0..batch_size)
                .map(|i| {
                    let last = encodings[i]
                        .get_attention_mask()
                        .iter()
                        .rposition(|&m| m == 1)
                        .unwrap_or(0);
                    let row: Vec<f32> = (0..self.dimension)
                        .map(|d| output[[i, last, d]])
                        .collect();
                    normalize(&row)
                })
                .collect(),
            2 => (0..batch_size)
                .map(|i| {
                    let row: Vec<f32> = (0..self.dimension).map(|d| output[[i, d]]).collect();
                    normalize(&row)
                })
                .collect(),
            _ => {
                return Err(ModelError::Inference(format!(
                    "unexpected output shape: {:?}",
                    shape
                )));
            }
        };

        Ok(embeddings)
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        match OnnxEmbedder::load(&config) {
            Err(EmbeddingError::Model(msg)) => assert!(msg.contains("model not found")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("load should fail without model.onnx"),
        }
    }
}
