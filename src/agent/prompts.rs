//! System prompt for the agricultural assistant.

use crate::tools::{KNOWLEDGE_BASE_TOOL, WEB_SEARCH_TOOL};

const INTRO: &str = "You are Cresco, an AI agricultural assistant designed specifically for UK farmers.";

const KNOWLEDGE_BASE_ENTRY: &str = "searches a knowledge base of UK agricultural documents.
   ALWAYS use this tool first to find relevant information before answering questions
   about farming, crops, diseases, nutrients or regulations.";

const WEB_SEARCH_ENTRY: &str = "searches the internet for real-time information. Use it to
   supplement your answer when the knowledge base does not cover the topic well
   (breaking news, regulation changes, niche subjects, climate data).";

const BODY: &str = r#"Your expertise covers:
- Crop diseases and pest management
- Nutrient management and fertiliser recommendations
- Wheat, barley, oats and maize cultivation
- Seed selection and certification standards
- UK agricultural regulations and best practices
- Farm performance optimisation

Guidelines:
1. ALWAYS search the knowledge base first using retrieve_agricultural_info
2. Provide practical, actionable advice based on the retrieved information
3. When discussing disease management, mention relevant fungicides and their timing
4. Reference specific growth stages (Zadoks scale) when applicable
5. Consider UK climate and soil conditions in your recommendations
6. If information is not found in the knowledge base, say so clearly{fallback}
7. Always prioritise Integrated Pest Management (IPM) principles
8. Be concise but thorough

When answering:
- Cite the source documents you retrieved
- Use metric units (kg/ha, litres/ha) as standard in UK agriculture
- Consider seasonal timing for agricultural operations
- Mention variety-specific information when relevant
- You may use GFM markdown tables

After your main response, if the query involves actionable farming tasks, add a
suggested action plan in the following JSON format at the END of your response:

---TASKS---
[
  {"title": "Task name", "detail": "Description", "priority": "high|medium|low"},
  {"title": "Task name", "detail": "Description", "priority": "high|medium|low", "due": "YYYY-MM-DD"}
]
---END_TASKS---

Example tasks: soil testing schedules, fertiliser application timing, disease
monitoring steps, crop rotation planning, regulatory compliance checks.

If asked about topics outside UK agriculture, politely redirect to your area of expertise.
"#;

/// Build the system prompt, listing only the tools in `tool_names`.
pub fn system_prompt(tool_names: &[&str]) -> String {
    let mut prompt = String::from(INTRO);
    prompt.push_str("\n\n");

    if tool_names.is_empty() {
        prompt.push_str("You have no tools available; answer from your own knowledge.\n\n");
    } else {
        prompt.push_str("You have access to the following tools:\n\n");
        for (i, name) in tool_names.iter().enumerate() {
            let entry = match *name {
                KNOWLEDGE_BASE_TOOL => KNOWLEDGE_BASE_ENTRY,
                WEB_SEARCH_TOOL => WEB_SEARCH_ENTRY,
                _ => "is available.",
            };
            prompt.push_str(&format!("{}. `{name}` {entry}\n", i + 1));
        }
        prompt.push('\n');
    }

    let fallback = if tool_names.contains(&WEB_SEARCH_TOOL) {
        " and consider\n   using internet_search to supplement"
    } else {
        ""
    };
    prompt.push_str(&BODY.replace("{fallback}", fallback));
    prompt
}

/// Answer stored when the model could not be reached.
pub const GENERIC_FAILURE: &str = "Sorry, I could not complete this request. Please try again.";

/// Answer used when the iteration cap is hit before any text was produced.
pub const INCOMPLETE_ANSWER: &str =
    "I was not able to finish researching this question. Please try asking again or narrowing it down.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_only_registered_tools() {
        let prompt = system_prompt(&[KNOWLEDGE_BASE_TOOL]);
        assert!(prompt.contains("1. `retrieve_agricultural_info` searches"));
        assert!(!prompt.contains("internet_search"));
        assert!(prompt.contains("say so clearly\n"));
        assert!(prompt.contains("---TASKS---"));
    }

    #[test]
    fn test_web_search_listed_when_registered() {
        let prompt = system_prompt(&[KNOWLEDGE_BASE_TOOL, WEB_SEARCH_TOOL]);
        assert!(prompt.contains("2. `internet_search` searches the internet"));
        assert!(prompt.contains("consider\n   using internet_search to supplement"));
    }
}
