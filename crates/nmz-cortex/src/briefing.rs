//! Briefing Generator: what to know before a reminded event, recalled from past memories.

use nmz_core::Memory;
use tracing::warn;

use crate::gateway::{CompletionProvider, CompletionRequest, DEFAULT_MODEL};

/// Leading marker the model emits when it located relevant history.
pub const RECALL_MARKER: &str = "RECALL_FOUND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Briefing {
    pub text: String,
}

impl Briefing {
    pub fn fallback(target: &Memory) -> Self {
        Self {
            text: format!("Reminder: {}", target.content),
        }
    }

    pub fn recall_found(&self) -> bool {
        self.text.trim_start().starts_with(RECALL_MARKER)
    }

    /// Text for display, without the recall marker line.
    pub fn body(&self) -> &str {
        if !self.recall_found() {
            return &self.text;
        }
        let rest = &self.text.trim_start()[RECALL_MARKER.len()..];
        rest.trim_start_matches([' ', '\t', ':'])
            .trim_start_matches(['\r', '\n'])
    }
}

fn briefing_prompt(target: &Memory, context: &str, user_name: Option<&str>) -> String {
    let user = user_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("the user");

    format!(
        r#"You are a highly efficient Personal Memory Assistant for {user}.

CURRENT SCENARIO:
The user has a reminder now for:
"{content}"

YOUR GOAL:
Check whether the user has done this before (met this person, visited this place, done this task) and recall their FEEDBACK from those experiences.

AVAILABLE MEMORY BANK:
{context}

INSTRUCTIONS:
1. Search for recurrence: look for memories with similar keywords (names, places) or tags like #feedback.
2. Detect sentiment: if found, how did it go last time? Good, bad, frustrating?
3. Output:
   - If you find relevant past feedback or experience, start your response with "{RECALL_MARKER}".
   - Give a briefing that quotes their past self, e.g. "Last time you met John, you noted: 'He hates being interrupted'."
   - If no past history is found, give a standard motivating summary.

OUTPUT FORMAT (Markdown):
(If history found):
{RECALL_MARKER}
### ⚠️ Past Experience Detected
**Last time:** [Summary of past feedback]
**Advice for today:** [Actionable tip based on past feedback]

(If no history):
### 📅 Event Briefing
[Standard summary]"#,
        content = target.content,
    )
}

/// Brief the user on a memory whose reminder fired. Never fails: an empty
/// answer or a provider error yields [`Briefing::fallback`].
pub async fn generate_briefing(
    provider: &dyn CompletionProvider,
    target: &Memory,
    all: &[Memory],
    api_key: Option<&str>,
    user_name: Option<&str>,
) -> Briefing {
    let context = all
        .iter()
        .filter(|memory| memory.id() != target.id())
        .map(|memory| {
            format!(
                "[ID:{}] ({}): {} | Tags: {}",
                memory.id(),
                memory.kind(),
                memory.content,
                memory.tags().join(",")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let request = match CompletionRequest::builder(DEFAULT_MODEL)
        .text(briefing_prompt(target, &context, user_name))
        .api_key(api_key)
        .build()
    {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "briefing request rejected");
            return Briefing::fallback(target);
        }
    };

    match provider.complete(request).await {
        Ok(completion) if !completion.text.trim().is_empty() => Briefing {
            text: completion.text,
        },
        Ok(_) => {
            warn!(memory = target.id(), "briefing came back empty");
            Briefing::fallback(target)
        }
        Err(error) => {
            warn!(%error, memory = target.id(), "briefing failed");
            Briefing::fallback(target)
        }
    }
}
