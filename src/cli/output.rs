use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::agent::ChatResponse;
use crate::models::{ConversationTurn, OutputFormat, RetrievalResult};

pub trait Formatter {
    fn format_retrieval(&self, query: &str, result: &RetrievalResult, duration_ms: u64) -> String;
    fn format_chat(&self, response: &ChatResponse) -> String;
    fn format_history(&self, user_id: &str, turns: &[ConversationTurn]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_index_stats(&self, stats: &IndexStats) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub dimension: u32,
    pub vector_store_driver: String,
    pub collection: String,
    /// `persistent` or `ephemeral`, when the index could be opened.
    pub durability: Option<String>,
    pub entries: Option<usize>,
    pub index_error: Option<String>,
    pub conversation_driver: String,
    pub chat_model: String,
    pub web_search_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub documents: usize,
    pub chunks_added: usize,
    /// Entries already present; nothing was embedded.
    pub already_indexed: Option<usize>,
    pub duration_ms: u64,
}

fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{head}...")
    } else {
        head
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_retrieval(&self, query: &str, result: &RetrievalResult, duration_ms: u64) -> String {
        if result.is_empty() {
            return format!("No results found for: {query}\n");
        }

        let mut output = String::new();
        writeln!(output, "Search results for: \"{query}\"").unwrap();
        writeln!(output, "Found {} results in {duration_ms}ms\n", result.len()).unwrap();

        for (i, (chunk, score)) in result.iter().enumerate() {
            writeln!(output, "{}. [Score: {score:.3}]", i + 1).unwrap();
            writeln!(output, "   Source:   {}", chunk.citation()).unwrap();
            writeln!(output, "   Category: {}", chunk.category()).unwrap();
            writeln!(output, "   ---").unwrap();
            for line in preview(&chunk.text, 200).lines() {
                writeln!(output, "   {line}").unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_chat(&self, response: &ChatResponse) -> String {
        let mut output = String::new();
        writeln!(output, "{}", response.answer).unwrap();

        if response.incomplete {
            writeln!(output, "\n(answer may be incomplete)").unwrap();
        }
        if !response.sources.is_empty() {
            writeln!(output, "\nSources: {}", response.sources.join(", ")).unwrap();
        }
        if !response.tasks.is_empty() {
            writeln!(output, "\nSuggested tasks:").unwrap();
            for task in &response.tasks {
                write!(output, "  [{}] {}", task.priority, task.title).unwrap();
                if let Some(due) = task.due {
                    write!(output, " (due {due})").unwrap();
                }
                writeln!(output).unwrap();
                writeln!(output, "      {}", task.detail).unwrap();
            }
        }

        output
    }

    fn format_history(&self, user_id: &str, turns: &[ConversationTurn]) -> String {
        if turns.is_empty() {
            return format!("No conversation history for {user_id}\n");
        }

        let mut output = String::new();
        for turn in turns {
            writeln!(
                output,
                "[{}] {}: {}",
                turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                turn.role,
                turn.content
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(
            output,
            "Embedding:     {} ({}, {} dims)",
            status.embedding_model, status.embedding_provider, status.dimension
        )
        .unwrap();
        writeln!(output, "Chat model:    {}", status.chat_model).unwrap();
        writeln!(
            output,
            "Web search:    {}",
            if status.web_search_enabled { "enabled" } else { "disabled" }
        )
        .unwrap();
        writeln!(output).unwrap();

        match &status.index_error {
            Some(error) => {
                writeln!(output, "Vector Index:  {} [UNAVAILABLE]", status.vector_store_driver).unwrap();
                writeln!(output, "  Error:       {error}").unwrap();
            }
            None => {
                let durability = status.durability.as_deref().unwrap_or("unknown");
                writeln!(output, "Vector Index:  {} [{}]", status.vector_store_driver, durability.to_uppercase()).unwrap();
                writeln!(output, "  Collection:  {}", status.collection).unwrap();
                writeln!(output, "  Entries:     {}", status.entries.unwrap_or(0)).unwrap();
                if durability == "ephemeral" {
                    writeln!(output, "  Warning:     index is lost when the process exits").unwrap();
                }
            }
        }
        writeln!(output, "Conversations: {}", status.conversation_driver).unwrap();

        output
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        let mut output = String::new();
        if let Some(entries) = stats.already_indexed {
            writeln!(output, "Knowledge base already indexed ({entries} entries).").unwrap();
            writeln!(output, "Use --force to rebuild.").unwrap();
            return output;
        }

        writeln!(output, "Indexing Complete").unwrap();
        writeln!(output, "-----------------").unwrap();
        writeln!(output, "Files scanned: {}", stats.files_scanned).unwrap();
        writeln!(output, "Documents:     {}", stats.documents).unwrap();
        writeln!(output, "Chunks added:  {}", stats.chunks_added).unwrap();
        writeln!(output, "Duration:      {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {error}")
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_retrieval(&self, query: &str, result: &RetrievalResult, duration_ms: u64) -> String {
        let hits: Vec<serde_json::Value> = result
            .iter()
            .map(|(chunk, score)| {
                serde_json::json!({
                    "score": score,
                    "source": chunk.citation(),
                    "category": chunk.category(),
                    "document_id": chunk.document_id,
                    "sequence_index": chunk.sequence_index,
                    "text": chunk.text,
                })
            })
            .collect();
        self.render(&serde_json::json!({
            "query": query,
            "duration_ms": duration_ms,
            "citations": result.citations,
            "results": hits,
        }))
    }

    fn format_chat(&self, response: &ChatResponse) -> String {
        self.render(response)
    }

    fn format_history(&self, user_id: &str, turns: &[ConversationTurn]) -> String {
        self.render(&serde_json::json!({"user_id": user_id, "turns": turns}))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        self.render(stats)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_retrieval(&self, query: &str, result: &RetrievalResult, duration_ms: u64) -> String {
        let mut output = String::new();
        writeln!(output, "## Search: {query}\n").unwrap();
        if result.is_empty() {
            writeln!(output, "_No results._").unwrap();
            return output;
        }

        writeln!(output, "_{} results in {duration_ms}ms_\n", result.len()).unwrap();
        for (i, (chunk, score)) in result.iter().enumerate() {
            writeln!(output, "### {}. {} ({score:.3})\n", i + 1, chunk.citation()).unwrap();
            writeln!(output, "**Category:** {}\n", chunk.category()).unwrap();
            for line in preview(&chunk.text, 400).lines() {
                writeln!(output, "> {line}").unwrap();
            }
            writeln!(output).unwrap();
        }
        output
    }

    fn format_chat(&self, response: &ChatResponse) -> String {
        let mut output = String::new();
        writeln!(output, "{}\n", response.answer).unwrap();

        if response.incomplete {
            writeln!(output, "> **Note:** this answer may be incomplete.\n").unwrap();
        }
        if !response.sources.is_empty() {
            writeln!(output, "**Sources**\n").unwrap();
            for source in &response.sources {
                writeln!(output, "- {source}").unwrap();
            }
            writeln!(output).unwrap();
        }
        if !response.tasks.is_empty() {
            writeln!(output, "| Priority | Task | Detail | Due |").unwrap();
            writeln!(output, "|---|---|---|---|").unwrap();
            for task in &response.tasks {
                let due = task.due.map(|d| d.to_string()).unwrap_or_default();
                writeln!(output, "| {} | {} | {} | {due} |", task.priority, task.title, task.detail).unwrap();
            }
        }
        output
    }

    fn format_history(&self, user_id: &str, turns: &[ConversationTurn]) -> String {
        let mut output = String::new();
        writeln!(output, "## Conversation: {user_id}\n").unwrap();
        for turn in turns {
            writeln!(output, "**{}** ({})\n", turn.role, turn.timestamp.to_rfc3339()).unwrap();
            writeln!(output, "{}\n", turn.content).unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(output, "| Component | Value |").unwrap();
        writeln!(output, "|---|---|").unwrap();
        writeln!(output, "| Embedding | {} ({}) |", status.embedding_model, status.embedding_provider).unwrap();
        writeln!(output, "| Dimension | {} |", status.dimension).unwrap();
        writeln!(output, "| Chat model | {} |", status.chat_model).unwrap();
        writeln!(output, "| Vector index | {} |", status.vector_store_driver).unwrap();
        writeln!(output, "| Collection | {} |", status.collection).unwrap();
        match &status.index_error {
            Some(error) => writeln!(output, "| Index error | {error} |").unwrap(),
            None => {
                writeln!(output, "| Durability | {} |", status.durability.as_deref().unwrap_or("unknown")).unwrap();
                writeln!(output, "| Entries | {} |", status.entries.unwrap_or(0)).unwrap();
            }
        }
        writeln!(output, "| Conversations | {} |", status.conversation_driver).unwrap();
        writeln!(output, "| Web search | {} |", status.web_search_enabled).unwrap();
        output
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        let mut output = String::new();
        writeln!(output, "## Indexing\n").unwrap();
        if let Some(entries) = stats.already_indexed {
            writeln!(output, "Already indexed: **{entries}** entries.").unwrap();
            return output;
        }
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|---|---|").unwrap();
        writeln!(output, "| Files scanned | {} |", stats.files_scanned).unwrap();
        writeln!(output, "| Documents | {} |", stats.documents).unwrap();
        writeln!(output, "| Chunks added | {} |", stats.chunks_added).unwrap();
        writeln!(output, "| Duration | {}ms |", stats.duration_ms).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("**Error:** {error}")
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Document, PlannerTask, Priority, meta};

    fn result() -> RetrievalResult {
        let doc = Document::new("d1", "Irrigate maize fields weekly during dry season.")
            .with_metadata(meta::FILENAME, "maize.md");
        let chunk = Chunk::from_document(&doc, doc.text.clone(), 0);
        RetrievalResult::from_ranked(vec![(chunk, 0.92)])
    }

    #[test]
    fn test_text_retrieval() {
        let output = TextFormatter.format_retrieval("maize", &result(), 12);
        assert!(output.contains("1. [Score: 0.920]"));
        assert!(output.contains("Source:   maize.md"));
    }

    #[test]
    fn test_json_chat_is_parseable() {
        let response = ChatResponse {
            answer: "Sow in March.".to_string(),
            sources: vec!["oats.md".to_string()],
            tasks: vec![PlannerTask {
                title: "Order seed".to_string(),
                detail: "C2 oats".to_string(),
                priority: Priority::Medium,
                due: None,
            }],
            incomplete: false,
            tool_calls: 1,
        };
        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(false).format_chat(&response)).unwrap();
        assert_eq!(json["tasks"][0]["priority"], "medium");
        assert_eq!(json["sources"][0], "oats.md");
    }

    #[test]
    fn test_empty_results() {
        let output = MarkdownFormatter.format_retrieval("rye", &RetrievalResult::empty(), 1);
        assert!(output.contains("_No results._"));
    }
}
