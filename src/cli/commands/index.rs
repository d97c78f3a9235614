//! Index command implementation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::App;
use crate::cli::output::{IndexStats, get_formatter};
use crate::error::IndexError;
use crate::models::{Config, OutputFormat};
use crate::services::IndexOutcome;
use crate::sources::KnowledgeBaseLoader;

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Knowledge-base directory or file (defaults to indexing.knowledge_base_path)
    pub path: Option<PathBuf>,

    /// Clear the collection and rebuild it
    #[arg(long)]
    pub force: bool,

    /// List the files that would be indexed without embedding anything
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_index(args: IndexArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start = Instant::now();

    let loader = KnowledgeBaseLoader::from_config(&config, args.path);
    if verbose {
        eprintln!("Knowledge base: {}", loader.root().display());
    }

    let files = loader.collect_files().context("failed to scan knowledge base")?;
    if args.dry_run {
        for file in &files {
            println!("{}", file.display());
        }
        println!(
            "{}",
            formatter.format_message(&format!("{} files would be indexed", files.len()))
        );
        return Ok(());
    }

    let documents = loader.load().context("failed to load knowledge base")?;
    let app = App::build(config).await.context("failed to open vector index")?;
    let indexer = app.indexer()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let result = indexer
        .index_corpus_with_progress(&documents, args.force, |added, total| {
            pb.set_length(total as u64);
            pb.set_position(added as u64);
        })
        .await;
    pb.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e @ (IndexError::BatchFailed { .. } | IndexError::Store { .. })) => {
            eprintln!(
                "{}",
                formatter.format_error(&format!(
                    "indexing stopped after {} chunks: {e}",
                    e.chunks_added()
                ))
            );
            return Err(e.into());
        }
        Err(e) => return Err(e).context("indexing failed"),
    };

    let mut stats = IndexStats {
        files_scanned: files.len(),
        documents: documents.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    match outcome {
        IndexOutcome::AlreadyIndexed(entries) => stats.already_indexed = Some(entries),
        IndexOutcome::Indexed { chunks, .. } => stats.chunks_added = chunks,
    }

    print!("{}", formatter.format_index_stats(&stats));
    Ok(())
}
