//! Process-wide components, built once from [`Config`] and passed down.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::{Agent, AgentSettings};
use crate::error::{AppError, ConfigError};
use crate::llm::{ChatModel, create_chat_model};
use crate::models::Config;
use crate::services::conversation::{ConversationStore, create_store};
use crate::services::embedding::{Embedder, create_embedder};
use crate::services::indexer::Indexer;
use crate::services::retriever::Retriever;
use crate::services::vector_store::{VectorIndex, create_index};
use crate::sources::KnowledgeBaseLoader;
use crate::tools::{KnowledgeBaseTool, TavilySearch, ToolRegistry, WebSearchTool};
use crate::utils::retry::RetryConfig;

pub struct App {
    config: Config,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    conversations: Arc<dyn ConversationStore>,
}

impl App {
    /// Open the embedder, vector index and conversation store named in
    /// `config`. A corrupt or mismatched index fails here.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        config.validate()?;

        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config, embedder.dimension()).await?;
        let conversations = create_store(&config)?;

        info!(
            embedder = embedder.model(),
            collection = index.collection(),
            durability = %index.durability(),
            "components ready"
        );
        Ok(Self::from_parts(config, embedder, index, conversations))
    }

    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            index,
            conversations,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    fn retry(&self) -> RetryConfig {
        RetryConfig::from(&self.config.retry)
    }

    pub fn loader(&self) -> KnowledgeBaseLoader {
        KnowledgeBaseLoader::from_config(&self.config, None)
    }

    pub fn indexer(&self) -> Result<Indexer, ConfigError> {
        Indexer::from_config(&self.config, self.embedder.clone(), self.index.clone())
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.embedder.clone(), self.index.clone())
            .with_default_top_k(self.config.search.default_top_k as usize)
            .with_retry(self.retry())
    }

    /// Knowledge-base tool, plus web search when it is enabled and has a key.
    pub fn tools(&self) -> ToolRegistry {
        let mut registry =
            ToolRegistry::new().with(Arc::new(KnowledgeBaseTool::new(self.retriever())));

        let web = &self.config.web_search;
        if web.enabled {
            match TavilySearch::new(web) {
                Ok(provider) => registry.register(Arc::new(
                    WebSearchTool::new(Arc::new(provider)).with_retry(self.retry()),
                )),
                Err(e) => warn!(error = %e, "web search disabled"),
            }
        }
        registry
    }

    pub fn agent(&self) -> Result<Agent, AppError> {
        let model = create_chat_model(&self.config.llm)?;
        Ok(self.agent_with_model(model))
    }

    pub fn agent_with_model(&self, model: Arc<dyn ChatModel>) -> Agent {
        Agent::new(
            model,
            self.tools(),
            self.conversations.clone(),
            AgentSettings::from_config(&self.config),
        )
    }

    /// Drop every indexed entry and every conversation.
    pub async fn reset(&self) -> Result<(), AppError> {
        self.index.clear().await?;
        self.conversations.clear_all().await?;
        info!("application state reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::models::Document;
    use crate::services::conversation::InMemoryConversationStore;
    use crate::services::vector_store::MemoryIndex;
    use crate::test_support::{KeywordEmbedder, ScriptedModel};

    fn app() -> App {
        let mut config = Config::default();
        config.web_search.enabled = false;
        config.indexing.batch_delay_ms = 0;
        App::from_parts(
            config,
            Arc::new(KeywordEmbedder::new()),
            Arc::new(MemoryIndex::new("kb", KeywordEmbedder::DIMENSION)),
            Arc::new(InMemoryConversationStore::new(20)),
        )
    }

    #[test]
    fn test_tools_without_web_search() {
        assert_eq!(app().tools().names(), vec!["retrieve_agricultural_info"]);
    }

    #[test]
    fn test_web_search_requires_key() {
        let mut app = app();
        app.config.web_search.enabled = true;
        app.config.web_search.api_key = None;
        assert_eq!(app.tools().names(), vec!["retrieve_agricultural_info"]);

        app.config.web_search.api_key = Some("tvly-test".to_string());
        assert_eq!(
            app.tools().names(),
            vec!["retrieve_agricultural_info", "internet_search"]
        );
    }

    #[test]
    fn test_prompt_names_only_registered_tools() {
        let mut app = app();
        let agent = app.agent_with_model(Arc::new(ScriptedModel::echo()));
        assert!(agent.system_prompt().contains("retrieve_agricultural_info"));
        assert!(!agent.system_prompt().contains("internet_search"));

        app.config.web_search.enabled = true;
        app.config.web_search.api_key = Some("tvly-test".to_string());
        let agent = app.agent_with_model(Arc::new(ScriptedModel::echo()));
        assert!(agent.system_prompt().contains("internet_search"));

        app.config.agent.system_prompt = Some("custom".to_string());
        let agent = app.agent_with_model(Arc::new(ScriptedModel::echo()));
        assert_eq!(agent.system_prompt(), "custom");
    }

    #[tokio::test]
    async fn test_reset_clears_index_and_conversations() {
        let app = app();
        app.indexer()
            .unwrap()
            .ingest(&[Document::new("wheat.md", "Wheat needs nitrogen in spring.")])
            .await
            .unwrap();
        app.agent_with_model(Arc::new(ScriptedModel::echo()))
            .chat("u", "hello", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(app.index().count().await.unwrap(), 1);
        assert_eq!(app.conversations().history("u").await.unwrap().len(), 2);

        app.reset().await.unwrap();
        assert_eq!(app.index().count().await.unwrap(), 0);
        assert!(app.conversations().history("u").await.unwrap().is_empty());
    }
}
