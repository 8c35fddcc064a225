//! Conversational Responder: answers questions about the user's memories
//! (and anything else) and reports which memories the answer relied on.
//!
//! Tools are always attached, so the provider cannot be asked for a strict
//! JSON envelope. The model instead appends a `||RELATED_IDS:[...]||`
//! marker that [`split_related_ids`] peels off the visible text.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use nmz_core::{AssistantTone, ChatMessage, Memory};
use regex::Regex;
use tracing::{debug, warn};

use crate::gateway::{
    CompletionProvider, CompletionRequest, GroundingLabel, GroundingReference, ModelChoice,
    ToolCapability,
};

pub const EMPTY_CONTEXT: &str = "No memories recorded in this session yet.";
pub const EMPTY_REPLY: &str = "I couldn't generate a response.";
pub const APOLOGY: &str = "I'm having trouble accessing my cognitive functions. Please check your API key in settings or network connection. If using the Thinking model, ensure you have quota.";

static RELATED_IDS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\|RELATED_IDS:(\[.*?\])\|\|").expect("valid regex"));

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub utterance: String,
    pub memories: Vec<Memory>,
    /// Memories the question is specifically about. Ids that do not resolve are ignored.
    pub scope_ids: Vec<String>,
    pub api_key: Option<String>,
    pub user_name: Option<String>,
    pub tone: AssistantTone,
    pub model: ModelChoice,
}

impl ChatRequest {
    pub fn new(utterance: impl Into<String>, memories: Vec<Memory>) -> Self {
        Self {
            utterance: utterance.into(),
            memories,
            ..Self::default()
        }
    }
}

fn tone_instruction(tone: AssistantTone) -> &'static str {
    match tone {
        AssistantTone::Friendly => "Be warm, encouraging, and conversational.",
        AssistantTone::Professional => "Be formal, efficient, and business-like.",
        AssistantTone::Concise => {
            "Be extremely brief and to the point. Use bullet points where possible."
        }
        AssistantTone::Enthusiastic => "Be high energy, positive, and motivating!",
        AssistantTone::Explanatory => {
            "Be detailed and educational, explaining context thoroughly."
        }
    }
}

fn local_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// One line per memory, in collection order.
pub fn memory_context(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }
    memories
        .iter()
        .map(|memory| {
            let mut line = format!(
                "ID: {} | Type: {} | Date: {} | Tags: {} | Content: {}",
                memory.id(),
                memory.kind(),
                local_timestamp(memory.created_at()),
                memory.tags().join(","),
                memory.content
            );
            if let Some(at) = memory.reminder_at {
                line.push_str(&format!(" | REMINDER SET FOR: {}", local_timestamp(at)));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn user_prompt(request: &ChatRequest) -> String {
    let scoped: Vec<&Memory> = request
        .memories
        .iter()
        .filter(|memory| request.scope_ids.iter().any(|id| id == memory.id()))
        .collect();
    if scoped.is_empty() {
        return request.utterance.clone();
    }

    let specific = scoped
        .iter()
        .map(|memory| format!("[ID: {}] Content: \"{}\"", memory.id(), memory.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "I am asking specifically about these memories:\n{specific}\n\nUser Question: {}",
        request.utterance
    )
}

fn system_instruction(request: &ChatRequest) -> String {
    let name_line = request
        .user_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!("The user's name is {name}.\n"))
        .unwrap_or_default();

    format!(
        r#"You are Cortex, an intelligent personal memory assistant.
{name_line}
PERSONALITY:
{tone}

CONTEXT:
You have access to the user's current session memories:
---
{context}
---

INSTRUCTIONS:
1. Answer the user's questions naturally according to your personality.
2. You can discuss ANY topic.
3. USE GOOGLE SEARCH if the user asks about current events, facts or general knowledge, or if the answer needs information not found in their memories.
4. USE GOOGLE MAPS if the user asks about a location, place, directions or geography (e.g. "Where is that restaurant I mentioned?").
5. If the user asks about their memories, answer strictly from the provided context.
6. PROACTIVE SUGGESTIONS AND TYPES:
   - Even when not asked explicitly, include the IDs of other memories relevant to the current topic (e.g. talking about food when a photo of a burger is saved).
   - If the user asks for specific types (e.g. "show images"), find all matching IDs.
7. At the very end of your response, output a JSON array of the relevant memory IDs in exactly this format:
   ||RELATED_IDS:["id_1", "id_2"]||
   (Do not output this tag if no specific memories are relevant.)"#,
        tone = tone_instruction(request.tone),
        context = memory_context(&request.memories),
    )
}

/// Remove the related-ids marker from `text`.
///
/// The marker is stripped even when its array does not parse; in that case
/// no ids are reported. The remaining text is trimmed.
pub fn split_related_ids(text: &str) -> (String, Vec<String>) {
    let Some(captures) = RELATED_IDS_MARKER.captures(text) else {
        return (text.trim().to_string(), Vec::new());
    };

    let ids = match serde_json::from_str::<Vec<String>>(&captures[1]) {
        Ok(ids) => ids,
        Err(error) => {
            warn!(%error, "failed to parse related memory ids");
            Vec::new()
        }
    };
    let visible = RELATED_IDS_MARKER.replace(text, "");
    (visible.trim().to_string(), ids)
}

/// Render grounding citations as a trailing "Sources" block. Web sources
/// come first; exact duplicates are dropped.
pub fn render_sources(grounding: &[GroundingReference]) -> Option<String> {
    let mut seen = HashSet::new();
    let lines: Vec<String> = [GroundingLabel::Web, GroundingLabel::Map]
        .into_iter()
        .flat_map(|label| grounding.iter().filter(move |r| r.label == label))
        .filter(|r| !r.title.is_empty() && !r.uri.is_empty())
        .map(|r| format!("• [{}] {}: {}", r.label, r.title, r.uri))
        .filter(|line| seen.insert(line.clone()))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(format!("\n\n**Sources:**\n{}", lines.join("\n")))
    }
}

/// Answer one user utterance. Never fails: a provider error yields the
/// fixed [`APOLOGY`] with no related ids.
pub async fn generate_response(
    provider: &dyn CompletionProvider,
    request: &ChatRequest,
) -> ChatMessage {
    let completion_request = match CompletionRequest::builder(&request.model.model)
        .text(user_prompt(request))
        .system_instruction(system_instruction(request))
        .tool(ToolCapability::WebSearch)
        .tool(ToolCapability::MapsGrounding)
        .thinking_budget(request.model.thinking_budget())
        .api_key(request.api_key.as_deref())
        .build()
    {
        Ok(completion_request) => completion_request,
        Err(error) => {
            warn!(%error, "chat request rejected");
            return ChatMessage::assistant(APOLOGY, Vec::new());
        }
    };
    debug!(?completion_request, memories = request.memories.len(), "asking assistant");

    let completion = match provider.complete(completion_request).await {
        Ok(completion) => completion,
        Err(error) => {
            warn!(%error, "assistant reply failed");
            return ChatMessage::assistant(APOLOGY, Vec::new());
        }
    };

    let (mut text, related_ids) = split_related_ids(&completion.text);
    if text.is_empty() {
        text = EMPTY_REPLY.to_string();
    }
    if let Some(sources) = render_sources(&completion.grounding) {
        text.push_str(&sources);
    }
    ChatMessage::assistant(text, related_ids)
}
