//! Connection Finder: which existing memories are strongly related to a candidate.

use std::collections::HashSet;

use nmz_core::Memory;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::gateway::{CompletionProvider, CompletionRequest, DEFAULT_MODEL, ResponseFormat};

/// Collections smaller than this never produce suggestions.
pub const MIN_COLLECTION_FOR_LINKS: usize = 3;
const CONTENT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedIds {
    #[serde(default)]
    related_ids: Vec<String>,
}

fn preview(content: &str) -> String {
    content.chars().take(CONTENT_PREVIEW_CHARS).collect()
}

fn connections_prompt(candidate: &Memory, existing: &[&Memory]) -> String {
    let existing_context = existing
        .iter()
        .map(|memory| {
            format!(
                "ID:{} | {}... | Tags: {}",
                memory.id(),
                preview(&memory.content),
                memory.tags().join(",")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze the relationship between a NEW memory and EXISTING memories.

NEW MEMORY:
{content} [Tags: {tags}]

EXISTING MEMORIES:
{existing_context}

TASK:
Identify existing memories that are STRONGLY related to the new one (same topic, same person, or a logical continuation).
Ignore weak connections.

OUTPUT:
Return a JSON object with an array of IDs:
{{ "relatedIds": ["id_1", "id_2"] }}
Return an empty array if there are no strong matches."#,
        content = candidate.content,
        tags = candidate.tags().join(", "),
    )
}

/// Ids of existing memories strongly related to `candidate`.
///
/// The candidate need not be persisted. Returns an empty list without
/// calling the provider when fewer than [`MIN_COLLECTION_FOR_LINKS`]
/// memories exist; failures are logged and also yield an empty list.
pub async fn find_connections(
    provider: &dyn CompletionProvider,
    candidate: &Memory,
    existing: &[Memory],
    api_key: Option<&str>,
) -> Vec<String> {
    if existing.len() < MIN_COLLECTION_FOR_LINKS {
        debug!(
            existing = existing.len(),
            "collection too small for link suggestions"
        );
        return Vec::new();
    }

    let others: Vec<&Memory> = existing
        .iter()
        .filter(|memory| memory.id() != candidate.id())
        .collect();

    let request = match CompletionRequest::builder(DEFAULT_MODEL)
        .text(connections_prompt(candidate, &others))
        .response_format(ResponseFormat::StrictJson)
        .api_key(api_key)
        .build()
    {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "link detection request rejected");
            return Vec::new();
        }
    };

    let completion = match provider.complete(request).await {
        Ok(completion) => completion,
        Err(error) => {
            warn!(%error, "link detection failed");
            return Vec::new();
        }
    };

    let text = completion.text.trim();
    let parsed: RelatedIds = match serde_json::from_str(if text.is_empty() { "{}" } else { text }) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(%error, "link detection returned malformed JSON");
            return Vec::new();
        }
    };

    let known: HashSet<&str> = others.iter().map(|memory| memory.id()).collect();
    let mut seen = HashSet::new();
    parsed
        .related_ids
        .into_iter()
        .filter(|id| known.contains(id.as_str()))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
