use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, ConversationDriver, OutputFormat};
use crate::services::create_store;

use super::chat::DEFAULT_USER;

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    #[command(about = "Print a user's retained conversation")]
    Show {
        #[arg(long, short = 'u', default_value = DEFAULT_USER)]
        user: String,
    },
    #[command(about = "Delete the most recent question and answer")]
    Undo {
        #[arg(long, short = 'u', default_value = DEFAULT_USER)]
        user: String,
    },
    #[command(about = "Delete a user's conversation, or every conversation with --all")]
    Clear {
        #[arg(long, short = 'u', default_value = DEFAULT_USER)]
        user: String,
        #[arg(long)]
        all: bool,
    },
}

pub async fn handle_history(cmd: HistoryCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let store = create_store(&config)?;
    if config.conversation.driver == ConversationDriver::Memory {
        eprintln!("Note: conversation.driver is \"memory\"; history does not outlive a chat session.");
    }

    match cmd {
        HistoryCommand::Show { user } => {
            let turns = store.history(&user).await?;
            print!("{}", formatter.format_history(&user, &turns));
        }
        HistoryCommand::Undo { user } => {
            if !store.delete_last_exchange(&user).await? {
                anyhow::bail!("no conversation history for {user}");
            }
            println!("{}", formatter.format_message("Removed last exchange."));
        }
        HistoryCommand::Clear { user, all } => {
            if all {
                store.clear_all().await?;
                println!("{}", formatter.format_message("Cleared all conversations."));
            } else {
                store.clear_user(&user).await?;
                println!(
                    "{}",
                    formatter.format_message(&format!("Cleared conversation for {user}."))
                );
            }
        }
    }

    Ok(())
}
