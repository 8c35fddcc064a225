//! Create-memory orchestration: analyze a draft, fold the result into it and,
//! when a reminder was found, suggest links to existing memories for the
//! user to confirm.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use nmz_core::{AnalysisResult, CoreError, Memory};
use tracing::debug;

use crate::InlinePayload;
use crate::analyzer::{AnalysisRequest, analyze_content};
use crate::connections::find_connections;
use crate::gateway::CompletionProvider;

pub const ANALYSIS_DELIMITER: &str = "--- Cortex Analysis ---";
const CANDIDATE_ID: &str = "temp";

/// A memory being composed, plus link suggestions awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDraft {
    pub memory: Memory,
    suggested_links: Vec<String>,
}

impl MemoryDraft {
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            suggested_links: Vec::new(),
        }
    }

    pub fn suggested_links(&self) -> &[String] {
        &self.suggested_links
    }

    /// Mark the draft as analyzing until the returned guard is dropped.
    pub fn begin_analysis(&mut self) -> AnalyzingGuard<'_> {
        self.memory.is_analyzing = true;
        AnalyzingGuard { draft: self }
    }

    /// Clearing the reminder also drops pending link suggestions.
    pub fn set_reminder(&mut self, at: Option<DateTime<Utc>>) {
        self.memory.reminder_at = at;
        if at.is_none() {
            self.suggested_links.clear();
        }
    }

    /// Link the accepted ids that were actually suggested, then clear the
    /// suggestions. Returns the ids newly linked.
    pub fn confirm_links<T: AsRef<str>>(
        &mut self,
        accepted: &[T],
    ) -> Result<Vec<String>, CoreError> {
        let mut confirmed: Vec<String> = Vec::new();
        for id in accepted.iter().map(|id| id.as_ref()) {
            if self.suggested_links.iter().any(|s| s == id)
                && !confirmed.iter().any(|c| c == id)
                && !self.memory.linked_memory_ids().iter().any(|l| l == id)
            {
                confirmed.push(id.to_string());
            }
        }
        self.memory.link_to(&confirmed)?;
        self.suggested_links.clear();
        Ok(confirmed)
    }

    pub fn into_memory(self) -> Memory {
        self.memory
    }
}

/// Holds a draft in the analyzing state; dropping it resolves the state on
/// every exit path, including early returns and panics.
pub struct AnalyzingGuard<'a> {
    draft: &'a mut MemoryDraft,
}

impl Deref for AnalyzingGuard<'_> {
    type Target = MemoryDraft;

    fn deref(&self) -> &MemoryDraft {
        self.draft
    }
}

impl DerefMut for AnalyzingGuard<'_> {
    fn deref_mut(&mut self) -> &mut MemoryDraft {
        self.draft
    }
}

impl Drop for AnalyzingGuard<'_> {
    fn drop(&mut self) {
        self.draft.memory.is_analyzing = false;
    }
}

/// Fold an analysis into a memory.
///
/// The summary lands in a delimited section at the end of the content, and
/// re-analysis replaces that section instead of stacking another one. Blank
/// content simply becomes the summary.
pub fn apply_analysis(memory: &mut Memory, analysis: &AnalysisResult) {
    let summary = analysis.summary.as_str();
    if !summary.is_empty() {
        if let Some((original, _)) = memory.content.split_once(ANALYSIS_DELIMITER) {
            memory.content = format!("{}\n\n{ANALYSIS_DELIMITER}\n{summary}", original.trim());
        } else if !memory.content.trim().is_empty() {
            if !memory.content.contains(summary) {
                memory.content = format!("{}\n\n{ANALYSIS_DELIMITER}\n{summary}", memory.content);
            }
        } else {
            memory.content = summary.to_string();
        }
    }

    memory.add_tags(&analysis.tags);
    if let Some(at) = analysis.reminder_at {
        memory.reminder_at = Some(at);
    }
}

#[derive(Debug, Clone)]
pub struct CurationOptions {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub current_year: Option<i32>,
    /// When off, detected reminders are ignored and no links are suggested.
    pub reminders_enabled: bool,
}

impl Default for CurationOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            current_year: None,
            reminders_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationReport {
    pub analysis: AnalysisResult,
    pub reminder_detected: bool,
    pub suggested_links: Vec<String>,
}

/// Analyze `draft` and apply the result to it.
///
/// Link suggestions are only computed when the analysis detected a reminder
/// and `existing` is non-empty; they are left on the draft for
/// [`MemoryDraft::confirm_links`].
pub async fn curate(
    provider: &dyn CompletionProvider,
    draft: &mut MemoryDraft,
    attachment: Option<InlinePayload>,
    existing: &[Memory],
    options: &CurationOptions,
) -> CurationReport {
    let mut draft = draft.begin_analysis();
    draft.suggested_links.clear();

    let text = draft.memory.content.clone();
    if text.trim().is_empty() && attachment.is_none() {
        debug!("nothing to analyze");
        return CurationReport {
            analysis: AnalysisResult::degraded(&text),
            reminder_detected: false,
            suggested_links: Vec::new(),
        };
    }

    let mut request = AnalysisRequest::new(text)
        .with_attachment(attachment)
        .with_api_key(options.api_key.clone());
    if let Some(model) = &options.model {
        request = request.with_model(model.clone());
    }
    if let Some(year) = options.current_year {
        request = request.with_current_year(year);
    }

    let mut analysis = analyze_content(provider, &request).await;
    if !options.reminders_enabled {
        analysis.reminder_at = None;
    }
    apply_analysis(&mut draft.memory, &analysis);

    let reminder_detected = analysis.reminder_at.is_some();
    if reminder_detected && !existing.is_empty() {
        let content = if analysis.summary.is_empty() {
            draft.memory.content.clone()
        } else {
            analysis.summary.clone()
        };
        let mut candidate = Memory::with_id(CANDIDATE_ID, draft.memory.kind(), content, Utc::now())
            .with_tags(draft.memory.tags());
        candidate.reminder_at = analysis.reminder_at;

        let own_id = draft.memory.id().to_string();
        draft.suggested_links =
            find_connections(provider, &candidate, existing, options.api_key.as_deref())
                .await
                .into_iter()
                .filter(|id| *id != own_id)
                .collect();
    }

    CurationReport {
        analysis,
        reminder_detected,
        suggested_links: draft.suggested_links.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_client::StubClient;
    use chrono::TimeZone;
    use nmz_core::MemoryKind;

    fn memory(id: &str, content: &str) -> Memory {
        Memory::with_id(
            id,
            MemoryKind::Text,
            content,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn collection() -> Vec<Memory> {
        vec![
            memory("m1", "Sam likes window seats"),
            memory("m2", "Grocery list"),
            memory("m3", "Flight to Lisbon booked"),
        ]
    }

    const WITH_REMINDER: &str = r#"{"analysis":"Flight to Lisbon","tags":["travel","urgent"],"reminderISO":"2025-05-02T08:00:00Z"}"#;

    #[test]
    fn analysis_section_is_appended_then_replaced() {
        let mut m = memory("a", "Poster on the fridge");
        let first = AnalysisResult {
            summary: "Concert on Friday".into(),
            tags: vec!["music".into()],
            reminder_at: None,
        };
        apply_analysis(&mut m, &first);
        assert_eq!(
            m.content,
            "Poster on the fridge\n\n--- Cortex Analysis ---\nConcert on Friday"
        );

        let second = AnalysisResult {
            summary: "Concert on Saturday".into(),
            ..first.clone()
        };
        apply_analysis(&mut m, &second);
        assert_eq!(
            m.content,
            "Poster on the fridge\n\n--- Cortex Analysis ---\nConcert on Saturday"
        );
        assert_eq!(m.tags(), ["music"]);
    }

    #[test]
    fn blank_content_becomes_summary_and_echo_is_not_duplicated() {
        let mut m = memory("a", "   ");
        apply_analysis(&mut m, &AnalysisResult::degraded("A receipt"));
        assert_eq!(m.content, "A receipt");

        let mut m = memory("a", "call mom");
        apply_analysis(&mut m, &AnalysisResult::degraded("call mom"));
        assert_eq!(m.content, "call mom");
    }

    #[test]
    fn tags_are_merged_without_duplicates() {
        let mut m = memory("a", "x").with_tags(&["urgent", "home"]);
        let analysis = AnalysisResult {
            summary: String::new(),
            tags: vec!["work".into(), "urgent".into()],
            reminder_at: None,
        };
        apply_analysis(&mut m, &analysis);
        let mut tags = m.tags().to_vec();
        tags.sort();
        assert_eq!(tags, vec!["home", "urgent", "work"]);
        assert_eq!(m.content, "x");
    }

    #[tokio::test]
    async fn reminder_gates_link_suggestions() {
        let provider = StubClient::replying(WITH_REMINDER).then(r#"{"relatedIds":["m1","m3"]}"#);
        let mut draft = MemoryDraft::new(memory("new", "flight friday").with_tags(&["urgent"]));

        let report = curate(
            &provider,
            &mut draft,
            None,
            &collection(),
            &CurationOptions::default(),
        )
        .await;
        assert!(report.reminder_detected);
        assert_eq!(report.suggested_links, vec!["m1", "m3"]);
        assert_eq!(draft.suggested_links(), ["m1", "m3"]);
        assert_eq!(
            draft.memory.reminder_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap())
        );
        assert!(!draft.memory.is_analyzing);
        assert_eq!(provider.calls(), 2);

        let candidate_prompt = provider.last_request().prompt_text();
        assert!(candidate_prompt.contains("Flight to Lisbon [Tags: urgent, travel]"));
    }

    #[tokio::test]
    async fn no_reminder_means_no_link_lookup() {
        let provider =
            StubClient::replying(r#"{"analysis":"Groceries","tags":["home"],"reminderISO":null}"#);
        let mut draft = MemoryDraft::new(memory("new", "milk, eggs"));

        let report = curate(
            &provider,
            &mut draft,
            None,
            &collection(),
            &CurationOptions::default(),
        )
        .await;
        assert!(!report.reminder_detected);
        assert!(report.suggested_links.is_empty());
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            draft.memory.content,
            "milk, eggs\n\n--- Cortex Analysis ---\nGroceries"
        );
    }

    #[tokio::test]
    async fn disabled_reminders_skip_linking() {
        let provider = StubClient::replying(WITH_REMINDER);
        let mut draft = MemoryDraft::new(memory("new", "flight friday"));
        let options = CurationOptions {
            reminders_enabled: false,
            ..CurationOptions::default()
        };

        let report = curate(&provider, &mut draft, None, &collection(), &options).await;
        assert!(!report.reminder_detected);
        assert_eq!(draft.memory.reminder_at, None);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn failure_still_resolves_analyzing_flag() {
        let provider = StubClient::failing();
        let mut draft = MemoryDraft::new(memory("new", "raw note"));

        let report = curate(
            &provider,
            &mut draft,
            None,
            &collection(),
            &CurationOptions::default(),
        )
        .await;
        assert_eq!(report.analysis, AnalysisResult::degraded("raw note"));
        assert!(!draft.memory.is_analyzing);
        assert_eq!(draft.memory.content, "raw note");
    }

    #[tokio::test]
    async fn empty_draft_is_not_sent() {
        let provider = StubClient::replying(WITH_REMINDER);
        let mut draft = MemoryDraft::new(memory("new", ""));
        let report = curate(
            &provider,
            &mut draft,
            None,
            &[],
            &CurationOptions::default(),
        )
        .await;
        assert!(!report.reminder_detected);
        assert_eq!(provider.calls(), 0);
        assert!(!draft.memory.is_analyzing);
    }

    #[test]
    fn guard_sets_and_clears_flag() {
        let mut draft = MemoryDraft::new(memory("a", "x"));
        {
            let guard = draft.begin_analysis();
            assert!(guard.memory.is_analyzing);
        }
        assert!(!draft.memory.is_analyzing);
    }

    #[test]
    fn clearing_reminder_drops_suggestions() {
        let mut draft = MemoryDraft::new(memory("a", "x"));
        draft.suggested_links = vec!["m1".into()];
        draft.set_reminder(Some(Utc::now()));
        assert_eq!(draft.suggested_links(), ["m1"]);
        draft.set_reminder(None);
        assert!(draft.suggested_links().is_empty());
        assert_eq!(draft.memory.reminder_at, None);
    }

    #[test]
    fn only_suggested_links_are_confirmed() {
        let mut draft = MemoryDraft::new(memory("a", "x"));
        draft.suggested_links = vec!["m1".into(), "m3".into()];

        let linked = draft.confirm_links(&["m3", "ghost", "m3"]).unwrap();
        assert_eq!(linked, vec!["m3"]);
        assert_eq!(draft.memory.linked_memory_ids(), ["m3"]);
        assert!(draft.suggested_links().is_empty());
    }
}
