use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::create_index;

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if verbose {
        eprintln!("Opening {} index", config.vector_store.driver);
    }

    let (durability, entries, index_error) =
        match create_index(&config, config.embedding.dimension as usize).await {
            Ok(index) => match index.count().await {
                Ok(count) => (Some(index.durability().to_string()), Some(count), None),
                Err(e) => (Some(index.durability().to_string()), None, Some(e.to_string())),
            },
            Err(e) => (None, None, Some(e.to_string())),
        };

    let status = StatusInfo {
        embedding_provider: config.embedding.provider.to_string(),
        embedding_model: config.embedding.model.clone(),
        dimension: config.embedding.dimension,
        vector_store_driver: config.vector_store.driver.to_string(),
        collection: config.vector_store.collection.clone(),
        durability,
        entries,
        index_error,
        conversation_driver: config.conversation.driver.to_string(),
        chat_model: config.llm.model.clone(),
        web_search_enabled: config.web_search.enabled && config.web_search.api_key.is_some(),
    };

    print!("{}", formatter.format_status(&status));
    Ok(())
}
