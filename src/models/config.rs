use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "cresco_knowledge_base";
pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

const CONFIG_DIR: &str = "cresco";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub categories: CategoryConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR).join("config.toml"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join(CONFIG_DIR))
    }

    /// Load the config file (defaults when absent) and overlay secrets from
    /// the environment, including a `.env` file in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str::<Config>(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    fn apply_env(&mut self) {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = env("OPENAI_API_KEY") {
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(key.clone());
            }
            if self.llm.api_key.is_none() {
                self.llm.api_key = Some(key);
            }
        }
        if self.web_search.api_key.is_none() {
            self.web_search.api_key = env("TAVILY_API_KEY");
        }
        if self.vector_store.api_key.is_none() {
            self.vector_store.api_key = env("QDRANT_API_KEY");
        }
        if let Some(path) = env("CRESCO_KNOWLEDGE_BASE") {
            self.indexing.knowledge_base_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.indexing.chunk_size == 0 || self.indexing.chunk_overlap == 0 {
            return invalid("chunk_size and chunk_overlap must be positive");
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return invalid("chunk_overlap must be smaller than chunk_size");
        }
        if self.indexing.batch_size == 0 {
            return invalid("indexing.batch_size must be at least 1");
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be positive");
        }
        if self.conversation.max_turns == 0 {
            return invalid("conversation.max_turns must be at least 1");
        }
        if self.agent.max_iterations == 0 {
            return invalid("agent.max_iterations must be at least 1");
        }
        Ok(())
    }

    /// Resolved path of the SQLite vector index.
    pub fn index_path(&self) -> PathBuf {
        self.vector_store.path.clone().unwrap_or_else(|| {
            Self::data_dir()
                .unwrap_or_else(|| PathBuf::from("./data"))
                .join("index.sqlite3")
        })
    }

    /// Resolved path of the durable conversation database.
    pub fn conversation_path(&self) -> PathBuf {
        self.conversation.path.clone().unwrap_or_else(|| {
            Self::data_dir()
                .unwrap_or_else(|| PathBuf::from("./data"))
                .join("conversations.sqlite3")
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    OpenAi,
    /// text-embeddings-inference style `/embed` server
    Http,
    /// In-process ONNX model
    Onnx,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::OpenAi => write!(f, "openai"),
            EmbeddingProvider::Http => write!(f, "http"),
            EmbeddingProvider::Onnx => write!(f, "onnx"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_openai_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Directory holding `model.onnx` and `tokenizer.json` for the ONNX provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_openai_url() -> String {
    DEFAULT_OPENAI_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            url: default_openai_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            api_key: None,
            model_path: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// Single-file SQLite index
    #[default]
    Sqlite,
    Qdrant,
    /// Non-durable fallback
    Memory,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Sqlite => write!(f, "sqlite"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// SQLite file; defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            collection: default_collection(),
            path: None,
            url: default_qdrant_url(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    /// Fixed character windows
    #[default]
    Positional,
    /// Window ends pulled back to paragraph/sentence/word breaks
    SentenceAware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_knowledge_base_path")]
    pub knowledge_base_path: PathBuf,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default)]
    pub chunk_mode: ChunkMode,

    /// Chunks per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Pause between embedding requests, to stay under provider rate limits.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_knowledge_base_path() -> PathBuf {
    PathBuf::from("./data/knowledge_base")
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/.DS_Store".to_string(),
        "**/~$*".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_batch_size() -> u32 {
    100
}

fn default_batch_delay_ms() -> u64 {
    1000
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            knowledge_base_path: default_knowledge_base_path(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            chunk_mode: ChunkMode::default(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_chat_model(),
            api_key: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tavily_url")]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_tavily_url() -> String {
    DEFAULT_TAVILY_URL.to_string()
}

fn default_max_results() -> u32 {
    5
}

fn default_topic() -> String {
    "general".to_string()
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_tavily_url(),
            api_key: None,
            max_results: default_max_results(),
            topic: default_topic(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model invocations allowed per turn before the answer is flagged incomplete.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Upper bound for one model call.
    #[serde(default = "default_llm_timeout")]
    pub model_timeout_secs: u64,

    /// Upper bound for one tool invocation.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Replaces the built-in system prompt when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    8
}

fn default_tool_timeout() -> u64 {
    45
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_timeout_secs: default_llm_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationDriver {
    #[default]
    Memory,
    Sqlite,
}

impl std::fmt::Display for ConversationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationDriver::Memory => write!(f, "memory"),
            ConversationDriver::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default)]
    pub driver: ConversationDriver,

    /// Turns retained per user; oldest are evicted first.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_max_turns() -> u32 {
    20
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            driver: ConversationDriver::default(),
            max_turns: default_max_turns(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// One filename keyword → category mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub keyword: String,
    pub category: String,
}

impl CategoryRule {
    pub fn new(keyword: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default = "default_category")]
    pub default: String,

    /// Checked in order; the first keyword found in the filename wins.
    #[serde(default = "default_category_rules")]
    pub rules: Vec<CategoryRule>,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_category_rules() -> Vec<CategoryRule> {
    [
        ("disease", "disease_management"),
        ("fungicide", "disease_management"),
        ("pest", "pest_management"),
        ("nutrient", "nutrient_management"),
        ("fertiliser", "nutrient_management"),
        ("fertilizer", "nutrient_management"),
        ("wheat", "wheat_cultivation"),
        ("barley", "barley_cultivation"),
        ("oat", "oats_cultivation"),
        ("maize", "maize_cultivation"),
        ("seed", "seed_certification"),
        ("regulation", "regulations"),
        ("performance", "farm_performance"),
    ]
    .into_iter()
    .map(|(k, c)| CategoryRule::new(k, c))
    .collect()
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            default: default_category(),
            rules: default_category_rules(),
        }
    }
}
