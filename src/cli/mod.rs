//! Command-line interface for the Cresco assistant.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Agricultural knowledge-base assistant: index documents, search them, and
/// chat with a tool-calling agent.
#[derive(Debug, Parser)]
#[command(name = "cresco")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show embedding, index and conversation backends
    Status,

    /// Index the knowledge-base directory
    Index(commands::IndexArgs),

    /// Ingest documents from a JSON/JSONL file
    Import(commands::ImportArgs),

    /// Search the knowledge base
    Search(commands::SearchArgs),

    /// Ask the assistant a question (interactive when no message is given)
    Chat(commands::ChatArgs),

    /// Inspect or edit a user's conversation
    #[command(subcommand)]
    History(commands::HistoryCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
