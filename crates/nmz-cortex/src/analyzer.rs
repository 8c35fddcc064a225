//! Content Analyzer: free text and/or an image in, `{summary, tags, reminder}` out.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use nmz_core::{AnalysisResult, merge_tags};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::InlinePayload;
use crate::extract::parse_embedded_json;
use crate::gateway::{CompletionProvider, CompletionRequest, DEFAULT_MODEL, ToolCapability};

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub text: String,
    pub attachment: Option<InlinePayload>,
    pub api_key: Option<String>,
    pub model: String,
    /// Year assumed for dates that omit one.
    pub current_year: i32,
}

impl AnalysisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            current_year: Local::now().year(),
        }
    }

    pub fn with_attachment(mut self, attachment: Option<InlinePayload>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }
}

/// Fields are read loosely: a value of the wrong JSON type is ignored
/// instead of failing the whole answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    analysis: Value,
    #[serde(default)]
    tags: Value,
    #[serde(default, rename = "reminderISO")]
    reminder_iso: Value,
}

impl RawAnalysis {
    fn tag_strings(&self) -> Vec<&str> {
        match &self.tags {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

fn analysis_prompt(text: &str, current_year: i32) -> String {
    format!(
        r#"Analyze the following input.
Input Text: "{text}"

If an image is provided, analyze its visual content (OCR text, scene description).
If the text contains a URL (a video, news article or social post), use Google Search to understand what the linked content is about.

TASKS:
1. Write a detailed but concise summary of the content. For a URL, summarize the linked page or video.
2. Extract 3-5 relevant tags.
3. Detect whether a specific UPCOMING event, deadline or time-sensitive task is mentioned (for example in a screenshot of an email, a calendar invite or a poster).
   If so, give its date and time in ISO 8601 format (YYYY-MM-DDTHH:mm:ss).
   Assume the year is {current_year} when it is not stated.

OUTPUT FORMAT:
Return ONLY a raw JSON object, without markdown formatting, shaped like:
{{
  "analysis": "The detailed description...",
  "tags": ["tag1", "tag2"],
  "reminderISO": "{current_year}-10-25T14:00:00" or null when no event is found
}}"#
    )
}

/// Analyze a capture. Never fails: any provider or parse problem yields
/// [`AnalysisResult::degraded`] so memory creation is never blocked.
pub async fn analyze_content(
    provider: &dyn CompletionProvider,
    request: &AnalysisRequest,
) -> AnalysisResult {
    let mut builder = CompletionRequest::builder(&request.model);
    if let Some(attachment) = &request.attachment {
        builder = builder.inline(attachment.clone());
    }
    let completion_request = match builder
        .text(analysis_prompt(&request.text, request.current_year))
        .tool(ToolCapability::WebSearch)
        .api_key(request.api_key.as_deref())
        .build()
    {
        Ok(completion_request) => completion_request,
        Err(error) => {
            warn!(%error, "analysis request rejected");
            return AnalysisResult::degraded(&request.text);
        }
    };

    let completion = match provider.complete(completion_request).await {
        Ok(completion) => completion,
        Err(error) => {
            warn!(%error, "content analysis failed; keeping input unanalyzed");
            return AnalysisResult::degraded(&request.text);
        }
    };

    match parse_analysis(&completion.text) {
        Some(result) => result,
        None => {
            warn!(
                response_len = completion.text.len(),
                "content analysis returned malformed output; keeping input unanalyzed"
            );
            AnalysisResult::degraded(&request.text)
        }
    }
}

/// Parse the model's answer into an [`AnalysisResult`].
///
/// Returns `None` when no JSON object can be recovered. An unparseable
/// `reminderISO` is dropped rather than failing the whole result.
pub fn parse_analysis(text: &str) -> Option<AnalysisResult> {
    let raw: RawAnalysis = parse_embedded_json(text).ok()?;
    Some(AnalysisResult {
        summary: raw.analysis.as_str().unwrap_or_default().to_string(),
        tags: merge_tags::<&str, &str>(&[], &raw.tag_strings()),
        reminder_at: raw.reminder_iso.as_str().and_then(parse_reminder),
    })
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Accepts RFC 3339, a naive local date-time (seconds and fraction
/// optional) or a bare date meaning local midnight.
pub fn parse_reminder(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ContentPart;
    use crate::normalize_bytes;
    use crate::stub_client::StubClient;

    fn local_instant(raw: &str) -> DateTime<Utc> {
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").unwrap();
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn image_only_input_never_fails() {
        let provider = StubClient::replying("I see a poster but cannot describe it");
        let request = AnalysisRequest::new("")
            .with_attachment(Some(normalize_bytes(b"png", "image/png")));

        let result = analyze_content(&provider, &request).await;
        assert!(result.tags.is_empty());
        assert_eq!(result.summary, "");

        let sent = provider.last_request();
        assert!(matches!(sent.parts()[0], ContentPart::Inline(_)));
    }

    #[tokio::test]
    async fn explicit_year_is_preserved() {
        let provider = StubClient::replying(
            r#"{"analysis":"Lunch with Sam","tags":["lunch","sam"],"reminderISO":"2025-03-14T12:00:00"}"#,
        );
        let request =
            AnalysisRequest::new("lunch with Sam on 2025-03-14T12:00:00").with_current_year(2031);

        let result = analyze_content(&provider, &request).await;
        assert_eq!(
            result.reminder_at,
            Some(local_instant("2025-03-14T12:00:00"))
        );
        assert_eq!(result.tags, vec!["lunch", "sam"]);
    }

    #[tokio::test]
    async fn prose_and_fences_are_tolerated() {
        let provider = StubClient::replying(
            "Here you go:\n```json\n{\"analysis\":\"A flyer\",\"tags\":[\"event\",\"event\"],\"reminderISO\":null}\n```\nAnything else?",
        );
        let result = analyze_content(&provider, &AnalysisRequest::new("flyer")).await;
        assert_eq!(result.summary, "A flyer");
        assert_eq!(result.tags, vec!["event"]);
        assert_eq!(result.reminder_at, None);
    }

    #[tokio::test]
    async fn unparseable_reminder_is_dropped_silently() {
        let provider = StubClient::replying(
            r#"{"analysis":"Dentist","tags":["health"],"reminderISO":"next tuesday-ish"}"#,
        );
        let result = analyze_content(&provider, &AnalysisRequest::new("dentist")).await;
        assert_eq!(result.summary, "Dentist");
        assert_eq!(result.tags, vec!["health"]);
        assert_eq!(result.reminder_at, None);
    }

    #[test]
    fn mistyped_fields_are_dropped_not_fatal() {
        let raw = r#"{"analysis":"Dentist","tags":["health"],"reminderISO":false}"#;
        let result = parse_analysis(raw).unwrap();
        assert_eq!(result.summary, "Dentist");
        assert_eq!(result.tags, vec!["health"]);
        assert_eq!(result.reminder_at, None);

        let raw = r#"{"analysis":"Dentist","tags":["health",3,null],"reminderISO":20250314}"#;
        let result = parse_analysis(raw).unwrap();
        assert_eq!(result.tags, vec!["health"]);
        assert_eq!(result.reminder_at, None);

        let result = parse_analysis(r#"{"analysis":42,"tags":"health"}"#).unwrap();
        assert_eq!(result.summary, "");
        assert!(result.tags.is_empty());
    }

    #[tokio::test]
    async fn malformed_output_degrades_to_input() {
        let provider = StubClient::replying("no json at all");
        let result = analyze_content(&provider, &AnalysisRequest::new("raw note")).await;
        assert_eq!(result, AnalysisResult::degraded("raw note"));
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_input() {
        let provider = StubClient::failing();
        let result = analyze_content(&provider, &AnalysisRequest::new("raw note")).await;
        assert_eq!(
            result,
            AnalysisResult {
                summary: "raw note".into(),
                tags: vec![],
                reminder_at: None
            }
        );
    }

    #[tokio::test]
    async fn identical_input_yields_identical_result() {
        let provider = StubClient::replying(
            r#"{"analysis":"Team offsite","tags":["work"],"reminderISO":"2025-06-01T09:30:00"}"#,
        );
        let request = AnalysisRequest::new("offsite").with_current_year(2025);
        let first = analyze_content(&provider, &request).await;
        let second = analyze_content(&provider, &request).await;
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn request_enables_web_search_and_names_the_year() {
        let provider = StubClient::replying("{}");
        let request = AnalysisRequest::new("https://video.example/watch?v=1")
            .with_current_year(2027)
            .with_api_key(Some("per-call".into()));
        let result = analyze_content(&provider, &request).await;
        assert_eq!(result.summary, "");

        let sent = provider.last_request();
        assert_eq!(sent.tools(), [ToolCapability::WebSearch]);
        assert_eq!(sent.api_key(), Some("per-call"));
        assert!(sent.prompt_text().contains("Assume the year is 2027"));
        assert!(sent.prompt_text().contains("https://video.example/watch?v=1"));
    }

    #[test]
    fn parse_reminder_formats() {
        assert_eq!(
            parse_reminder("2025-03-14T12:00:00Z"),
            Some(Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap())
        );
        assert_eq!(
            parse_reminder("2025-03-14T12:00"),
            Some(local_instant("2025-03-14T12:00:00"))
        );
        assert_eq!(
            parse_reminder("2025-03-14"),
            Some(local_instant("2025-03-14T00:00:00"))
        );
        assert_eq!(parse_reminder("null"), None);
        assert_eq!(parse_reminder("soon"), None);
    }
}
