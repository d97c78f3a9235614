//! Document sources feeding the indexer.

pub mod import;
pub mod local;

pub use import::{parse_documents, read_documents};
pub use local::KnowledgeBaseLoader;
