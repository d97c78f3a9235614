//! Import command implementation.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::App;
use crate::cli::output::{IndexStats, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::CategoryClassifier;
use crate::sources::read_documents;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Path to JSON or JSONL file (use - for stdin)
    #[arg()]
    pub file: Option<PathBuf>,

    /// Only validate the import file without indexing
    #[arg(long)]
    pub validate_only: bool,
}

pub async fn handle_import(args: ImportArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start = Instant::now();
    let classifier = CategoryClassifier::from_config(&config.categories);

    let documents = match args.file.as_deref() {
        None => read_documents(io::stdin().lock(), &classifier),
        Some(path) if path.as_os_str() == "-" => read_documents(io::stdin().lock(), &classifier),
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            read_documents(file, &classifier)
        }
    }
    .context("failed to parse import file")?;

    if verbose {
        eprintln!("Parsed {} documents", documents.len());
    }
    if args.validate_only {
        println!(
            "{}",
            formatter.format_message(&format!("{} documents are valid", documents.len()))
        );
        return Ok(());
    }

    let app = App::build(config).await.context("failed to open vector index")?;
    let chunks_added = app
        .indexer()?
        .ingest(&documents)
        .await
        .context("import failed")?;

    let stats = IndexStats {
        documents: documents.len(),
        chunks_added,
        duration_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    print!("{}", formatter.format_index_stats(&stats));
    Ok(())
}
