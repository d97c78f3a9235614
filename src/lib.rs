pub mod agent;
pub mod app;
pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod services;
pub mod sources;
pub mod tools;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::{Agent, ChatResponse};
pub use app::App;
pub use cli::{Cli, Commands};
pub use error::AppError;
pub use models::{Config, OutputFormat};
