use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::App;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<usize>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let limit = args.limit.unwrap_or(config.search.default_top_k as usize);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let app = App::build(config).await.context("failed to open knowledge base")?;
    let query = args.query.trim();
    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Limit: {limit}");
        eprintln!("  Collection: {}", app.index().collection());
    }

    let start = Instant::now();
    let result = app
        .retriever()
        .retrieve(query, Some(limit))
        .await
        .context("search failed")?;
    let duration_ms = start.elapsed().as_millis() as u64;

    print!("{}", formatter.format_retrieval(query, &result, duration_ms));
    Ok(())
}
