use nmz_core::Memory;
use tracing::warn;

use crate::gateway::{CompletionProvider, CompletionRequest, DEFAULT_MODEL};

pub const NOTHING_SELECTED: &str = "No memories selected.";
pub const NO_SUMMARY: &str = "Could not generate summary.";
pub const SUMMARY_FAILED: &str = "Error generating summary.";

fn selection_prompt(memories: &[&Memory], user_name: Option<&str>) -> String {
    let user = user_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!(" ({name})"))
        .unwrap_or_default();
    let block = memories
        .iter()
        .map(|memory| {
            format!(
                "[{}]: {} (Tags: {})",
                memory.kind(),
                memory.content,
                memory.tags().join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        r#"You are Cortex. The user{user} has selected {count} specific memories and wants a consolidated summary.

SELECTED MEMORIES:
{block}

INSTRUCTIONS:
1. Identify the common themes or connections between these items.
2. Synthesize them into a single cohesive narrative or summary.
3. Don't just list them; explain how they relate if possible."#,
        count = memories.len(),
    )
}

/// One narrative summary for a user-selected group of memories.
pub async fn summarize_selection(
    provider: &dyn CompletionProvider,
    memories: &[&Memory],
    api_key: Option<&str>,
    user_name: Option<&str>,
) -> String {
    if memories.is_empty() {
        return NOTHING_SELECTED.to_string();
    }

    let request = match CompletionRequest::builder(DEFAULT_MODEL)
        .text(selection_prompt(memories, user_name))
        .api_key(api_key)
        .build()
    {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "summary request rejected");
            return SUMMARY_FAILED.to_string();
        }
    };

    match provider.complete(request).await {
        Ok(completion) if !completion.text.trim().is_empty() => completion.text,
        Ok(_) => NO_SUMMARY.to_string(),
        Err(error) => {
            warn!(%error, selected = memories.len(), "selection summary failed");
            SUMMARY_FAILED.to_string()
        }
    }
}
