use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolArtifact, ToolOutput, query_argument, query_schema};
use crate::error::ToolError;
use crate::services::retriever::Retriever;

pub const KNOWLEDGE_BASE_TOOL: &str = "retrieve_agricultural_info";

const DESCRIPTION: &str = "Search the agricultural knowledge base for relevant information. \
Use this tool to find information about crop diseases and pest management, nutrient \
management and fertiliser recommendations, wheat, barley, oats and maize cultivation, \
seed selection and certification standards, and UK agricultural regulations.";

pub const NO_RESULTS: &str = "No relevant documents were found in the knowledge base.";

/// Searches the private corpus through the [`Retriever`].
pub struct KnowledgeBaseTool {
    retriever: Retriever,
    top_k: usize,
}

impl KnowledgeBaseTool {
    pub fn new(retriever: Retriever) -> Self {
        let top_k = retriever.default_top_k();
        Self { retriever, top_k }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[async_trait]
impl Tool for KnowledgeBaseTool {
    fn name(&self) -> &str {
        KNOWLEDGE_BASE_TOOL
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        query_schema("What to look up in the agricultural documents")
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = query_argument(self.name(), &args)?;

        let result = self
            .retriever
            .retrieve(&query, Some(self.top_k))
            .await
            .map_err(|e| ToolError::Failed {
                tool: self.name().to_string(),
                reason: e.to_string(),
            })?;

        if result.is_empty() {
            return Ok(ToolOutput::text(NO_RESULTS));
        }

        let content = result
            .chunks
            .iter()
            .map(|chunk| {
                format!(
                    "Source: {}\nCategory: {}\nContent: {}",
                    chunk.citation(),
                    chunk.category(),
                    chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolOutput::with_artifact(
            content,
            ToolArtifact::Chunks(result.chunks),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::models::{ChunkMode, Document, meta};
    use crate::services::chunker::TextChunker;
    use crate::services::indexer::Indexer;
    use crate::services::vector_store::MemoryIndex;
    use crate::test_support::KeywordEmbedder;

    async fn tool(docs: &[Document]) -> KnowledgeBaseTool {
        let embedder = Arc::new(KeywordEmbedder::new());
        let index = Arc::new(MemoryIndex::new("kb", KeywordEmbedder::DIMENSION));
        let chunker = TextChunker::new(500, 50, ChunkMode::Positional).unwrap();
        Indexer::new(chunker, embedder.clone(), index.clone())
            .ingest(docs)
            .await
            .unwrap();
        KnowledgeBaseTool::new(Retriever::new(embedder, index))
    }

    #[tokio::test]
    async fn test_formats_source_category_content() {
        let doc = Document::new("maize_guide.md", "Irrigate maize fields weekly during dry season.")
            .with_metadata(meta::FILENAME, "maize_guide.md")
            .with_metadata(meta::CATEGORY, "maize_cultivation");
        let tool = tool(&[doc]).await.with_top_k(1);

        let output = tool.call(json!({"query": "maize irrigation"})).await.unwrap();

        assert_eq!(
            output.content,
            "Source: maize_guide.md\nCategory: maize_cultivation\nContent: Irrigate maize fields weekly during dry season."
        );
        assert_eq!(output.citations(), vec!["maize_guide.md"]);
    }

    #[tokio::test]
    async fn test_empty_index_reports_no_results() {
        let tool = tool(&[]).await;
        let output = tool.call(json!({"query": "wheat"})).await.unwrap();
        assert_eq!(output.content, NO_RESULTS);
        assert!(output.artifact.is_none());
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid() {
        let tool = tool(&[]).await;
        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
