use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration (secrets masked)")]
    Show,
    #[command(about = "Show configuration and data file paths")]
    Path,
    #[command(about = "Set a value by dotted key, e.g. `indexing.chunk_size 800`")]
    Set {
        key: String,
        value: String,
    },
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(),
        ConfigCommand::Set { key, value } => handle_set(&key, &value, formatter.as_ref()),
    }
}

fn config_path() -> Result<std::path::PathBuf> {
    Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))
}

fn handle_init(force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = config_path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let path = Config::default().save().context("failed to write config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn masked(mut config: Config) -> Config {
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some(MASK.to_string());
        }
    };
    mask(&mut config.embedding.api_key);
    mask(&mut config.llm.api_key);
    mask(&mut config.web_search.api_key);
    mask(&mut config.vector_store.api_key);
    config
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = masked(Config::load()?);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path().filter(|p| p.exists()) {
        println!("# Config file: {}", path.display());
    } else {
        println!("# No config file; showing defaults");
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_path(label: &str, path: &Path) {
    let state = if path.exists() { "exists" } else { "missing" };
    println!("{label:<16} {} ({state})", path.display());
}

fn handle_path() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    print_path("Config file:", &config_path()?);
    if let Some(dir) = Config::data_dir() {
        print_path("Data directory:", &dir);
    }
    print_path("Vector index:", &config.index_path());
    print_path("Conversations:", &config.conversation_path());
    print_path("Knowledge base:", &config.indexing.knowledge_base_path);

    if let Ok(cwd) = std::env::current_dir() {
        print_path(".env file:", &cwd.join(".env"));
    }
    Ok(())
}

/// Interpret `raw` as a TOML value, falling back to a plain string.
fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn set_dotted(table: &mut toml::Table, key: &str, value: toml::Value) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').map(str::trim).collect();
    let Some(leaf) = parts.pop().filter(|l| !l.is_empty()) else {
        anyhow::bail!("invalid key: {key}");
    };

    let mut current = table;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        current = match entry {
            toml::Value::Table(t) => t,
            _ => anyhow::bail!("{part} is not a section"),
        };
    }
    current.insert(leaf.to_string(), value);
    Ok(())
}

fn handle_set(key: &str, raw: &str, formatter: &dyn Formatter) -> Result<()> {
    let path = config_path()?;
    let content = if path.exists() {
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?
    } else {
        toml::to_string(&Config::default())?
    };

    let mut table: toml::Table = toml::from_str(&content).context("config file is not valid TOML")?;
    set_dotted(&mut table, key, parse_value(raw))?;

    let rendered = toml::to_string_pretty(&table)?;
    let config: Config = toml::from_str(&rendered).with_context(|| format!("invalid value for {key}"))?;
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, rendered)?;
    println!("{}", formatter.format_message(&format!("Set {key} = {raw}")));
    Ok(())
}
