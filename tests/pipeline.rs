//! End-to-end: load a knowledge base from disk, index it, retrieve, and
//! answer through the agent loop with deterministic model and embedder.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use cresco::error::{EmbeddingError, ModelError};
use cresco::llm::{ChatMessage, ChatModel, ChatRole, ModelResponse, ToolCall, ToolDefinition};
use cresco::models::{Config, Priority, Role};
use cresco::services::conversation::InMemoryConversationStore;
use cresco::services::embedding::{Embedder, Embedding};
use cresco::services::indexer::IndexOutcome;
use cresco::services::vector_store::MemoryIndex;
use cresco::App;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TERMS: [&str; 5] = ["maize", "wheat", "irrigat", "nitrogen", "frost"];

struct TermEmbedder;

#[async_trait]
impl Embedder for TermEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = TERMS.iter().map(|w| lower.matches(w).count() as f32).collect();
                v.push(0.05);
                v
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        TERMS.len() + 1
    }

    fn model(&self) -> &str {
        "term-count"
    }
}

/// Looks the question up once, then answers from the first retrieved source.
struct LookupModel;

#[async_trait]
impl ChatModel for LookupModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        let last_user = messages
            .iter()
            .rposition(|m| m.role == ChatRole::User)
            .unwrap_or_default();
        let tool_result = messages[last_user..]
            .iter()
            .find(|m| m.role == ChatRole::Tool)
            .map(|m| m.content.clone());

        let Some(result) = tool_result else {
            let query = serde_json::json!({ "query": messages[last_user].content }).to_string();
            return Ok(ModelResponse::with_tool_calls(vec![ToolCall::new(
                "call-1",
                "retrieve_agricultural_info",
                query,
            )]));
        };

        let source = result
            .lines()
            .find_map(|l| l.strip_prefix("Source: "))
            .unwrap_or("nowhere")
            .to_string();
        Ok(ModelResponse::text(format!(
            "According to {source}, irrigate maize at silking.\n\
             ---TASKS---\n\
             [{{\"title\": \"Check soil moisture\", \"detail\": \"Probe at 30cm\", \"priority\": \"high\", \"due\": \"2026-07-01\"}}]\n\
             ---END_TASKS---"
        )))
    }

    fn model(&self) -> &str {
        "lookup"
    }
}

fn knowledge_base() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("maize_irrigation.md"),
        "Maize irrigation: irrigate maize at silking when soil moisture drops.",
    )
    .unwrap();
    fs::write(
        dir.path().join("wheat_nitrogen.md"),
        "Winter wheat needs nitrogen split across tillering and stem extension.",
    )
    .unwrap();
    fs::write(dir.path().join("empty.txt"), "   \n").unwrap();
    dir
}

fn app(kb: &TempDir) -> App {
    let mut config = Config::default();
    config.indexing.knowledge_base_path = kb.path().to_path_buf();
    config.indexing.batch_delay_ms = 0;
    config.web_search.enabled = false;

    let embedder = Arc::new(TermEmbedder);
    App::from_parts(
        config,
        embedder.clone(),
        Arc::new(MemoryIndex::new("agriculture", embedder.dimension())),
        Arc::new(InMemoryConversationStore::new(20)),
    )
}

#[tokio::test]
async fn test_index_then_retrieve_maize_document() {
    let kb = knowledge_base();
    let app = app(&kb);

    let documents = app.loader().load().unwrap();
    assert_eq!(documents.len(), 2);

    let outcome = app.indexer().unwrap().index_corpus(&documents, false).await.unwrap();
    assert_eq!(outcome, IndexOutcome::Indexed { documents: 2, chunks: 2 });

    let result = app
        .retriever()
        .retrieve("When should I irrigate maize?", Some(1))
        .await
        .unwrap();
    assert_eq!(result.citations, vec!["maize_irrigation.md"]);
    assert!(result.chunks[0].text.contains("silking"));
}

#[tokio::test]
async fn test_second_index_run_is_skipped_unless_forced() {
    let kb = knowledge_base();
    let app = app(&kb);
    let documents = app.loader().load().unwrap();
    let indexer = app.indexer().unwrap();

    indexer.index_corpus(&documents, false).await.unwrap();
    assert_eq!(
        indexer.index_corpus(&documents, false).await.unwrap(),
        IndexOutcome::AlreadyIndexed(2)
    );

    indexer.index_corpus(&documents, true).await.unwrap();
    assert_eq!(app.index().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_agent_answers_with_sources_and_tasks() {
    let kb = knowledge_base();
    let app = app(&kb);
    let documents = app.loader().load().unwrap();
    app.indexer().unwrap().index_corpus(&documents, false).await.unwrap();

    let agent = app.agent_with_model(Arc::new(LookupModel));
    let response = agent
        .chat("farmer", "How do I irrigate maize?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        response.answer,
        "According to maize_irrigation.md, irrigate maize at silking."
    );
    assert_eq!(response.sources.first().map(String::as_str), Some("maize_irrigation.md"));
    assert_eq!(response.tool_calls, 1);
    assert!(!response.incomplete);
    assert_eq!(response.tasks.len(), 1);
    assert_eq!(response.tasks[0].priority, Priority::High);
    assert_eq!(response.tasks[0].due.map(|d| d.to_string()).as_deref(), Some("2026-07-01"));

    let history = agent.history("farmer").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert!(!history[1].content.contains("---TASKS---"));
}

#[tokio::test]
async fn test_reset_empties_index_and_history() {
    let kb = knowledge_base();
    let app = app(&kb);
    let documents = app.loader().load().unwrap();
    app.indexer().unwrap().index_corpus(&documents, false).await.unwrap();
    app.agent_with_model(Arc::new(LookupModel))
        .chat("farmer", "maize?", &CancellationToken::new())
        .await
        .unwrap();

    app.reset().await.unwrap();

    assert_eq!(app.index().count().await.unwrap(), 0);
    assert!(app.conversations().history("farmer").await.unwrap().is_empty());
}
