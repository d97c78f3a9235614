//! Trailing task block parsing.
//!
//! The model may finish an answer with
//!
//! ```text
//! ---TASKS---
//! [{"title": "...", "detail": "...", "priority": "high"}]
//! ---END_TASKS---
//! ```
//!
//! Parsing is two-phase: [`split_task_block`] separates the visible answer from
//! the raw block, then [`decode_tasks`] decodes the block as typed tasks.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::TaskBlockError;
use crate::models::PlannerTask;

pub const TASKS_START: &str = "---TASKS---";
pub const TASKS_END: &str = "---END_TASKS---";

static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-zA-Z]*\s*|\s*```$").unwrap());

/// Answer text with its task block removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnswer {
    pub answer: String,
    pub tasks: Vec<PlannerTask>,
}

/// Split `raw` on the last start marker. Returns the trimmed visible text and
/// the block body, up to the end marker when one is present.
pub fn split_task_block(raw: &str) -> (&str, Option<&str>) {
    let Some(start) = raw.rfind(TASKS_START) else {
        return (raw.trim(), None);
    };

    let visible = raw[..start].trim();
    let rest = &raw[start + TASKS_START.len()..];
    let body = match rest.find(TASKS_END) {
        Some(end) => &rest[..end],
        None => rest,
    };
    (visible, Some(body.trim()))
}

pub fn decode_tasks(block: &str) -> Result<Vec<PlannerTask>, TaskBlockError> {
    let body = RE_CODE_FENCE.replace_all(block.trim(), "");
    let body = body.trim();
    if body.is_empty() {
        return Err(TaskBlockError("task block is empty".to_string()));
    }
    serde_json::from_str(body).map_err(|e| TaskBlockError(e.to_string()))
}

/// Strip the task block from `raw` and decode it. A malformed block yields no
/// tasks but is still removed from the answer.
pub fn extract_tasks(raw: &str) -> ParsedAnswer {
    let (visible, block) = split_task_block(raw);

    let tasks = match block.map(decode_tasks) {
        None => Vec::new(),
        Some(Ok(tasks)) => tasks,
        Some(Err(e)) => {
            warn!(error = %e, "discarding malformed task block");
            Vec::new()
        }
    };

    ParsedAnswer {
        answer: visible.to_string(),
        tasks,
    }
}
