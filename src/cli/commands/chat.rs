//! Chat command: one-shot question or interactive session.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::app::App;
use crate::cli::output::{Formatter, get_formatter};
use crate::error::AgentError;
use crate::models::{Config, OutputFormat};

pub const DEFAULT_USER: &str = "default";

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Question to ask; starts an interactive session when omitted
    pub message: Option<String>,

    /// Conversation owner
    #[arg(long, short = 'u', default_value = DEFAULT_USER)]
    pub user: String,
}

pub async fn handle_chat(
    args: ChatArgs,
    format: OutputFormat,
    verbose: bool,
    shutdown: CancellationToken,
) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let app = App::build(config).await.context("failed to start assistant")?;
    let agent = app.agent().context("failed to create chat model")?;

    if verbose {
        eprintln!("User: {}", args.user);
        eprintln!("Tools: {}", agent.tools().names().join(", "));
    }

    match args.message {
        Some(message) => {
            let response = agent
                .chat(&args.user, &message, &shutdown)
                .await
                .context("chat failed")?;
            print!("{}", formatter.format_chat(&response));
            Ok(())
        }
        None => repl(&agent, &args.user, formatter.as_ref(), &shutdown).await,
    }
}

async fn repl(
    agent: &Agent,
    user: &str,
    formatter: &dyn Formatter,
    shutdown: &CancellationToken,
) -> Result<()> {
    println!(
        "{}",
        style("Cresco agricultural assistant. /undo, /reset, /history, /quit").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", style(">").green().bold());

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => break,
        };
        let Some(line) = line else { break };
        let message = line.trim();

        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/undo" => {
                let removed = agent.delete_last_exchange(user).await?;
                let note = if removed { "Removed last exchange." } else { "Nothing to undo." };
                println!("{}", formatter.format_message(note));
            }
            "/reset" => {
                agent.reset(user).await?;
                println!("{}", formatter.format_message("Conversation cleared."));
            }
            "/history" => {
                let turns = agent.history(user).await?;
                print!("{}", formatter.format_history(user, &turns));
            }
            _ => match agent.chat(user, message, shutdown).await {
                Ok(response) => println!("{}", formatter.format_chat(&response)),
                Err(AgentError::Cancelled) => break,
                Err(e) => eprintln!("{}", formatter.format_error(&e.to_string())),
            },
        }
    }

    Ok(())
}
