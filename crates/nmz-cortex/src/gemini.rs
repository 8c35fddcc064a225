use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::gateway::{
    Completion, CompletionProvider, CompletionRequest, ContentPart, GroundingLabel,
    GroundingReference, ResponseFormat, ToolCapability,
};
use crate::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    base_url: String,
    default_api_key: Option<String>,
    http: reqwest::Client,
}

impl GeminiClient {
    /// `default_api_key` is used whenever a request carries no override.
    pub fn new(default_api_key: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_api_key: default_api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(self)
    }

    fn resolve_api_key<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Result<&'a str, ProviderError> {
        request
            .api_key()
            .or(self.default_api_key.as_deref())
            .ok_or(ProviderError::MissingCredential)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field(
                "default_api_key",
                &self.default_api_key.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let api_key = self.resolve_api_key(&request)?;
        let url = self.endpoint(request.model());
        let body = build_request_body(&request);

        debug!(
            model = request.model(),
            tools = request.tools().len(),
            thinking_budget = ?request.thinking_budget(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(map_error_status(status, &headers, text));
        }

        parse_response_body(&text)
    }
}

pub(crate) fn build_request_body(request: &CompletionRequest) -> Value {
    let parts: Vec<Value> = request
        .parts()
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::Inline(payload) => json!({
                "inlineData": {
                    "mimeType": payload.media_type,
                    "data": payload.data,
                }
            }),
        })
        .collect();

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
    });

    if let Some(system) = request.system_instruction() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }

    if !request.tools().is_empty() {
        let tools: Vec<Value> = request
            .tools()
            .iter()
            .map(|tool| match tool {
                ToolCapability::WebSearch => json!({ "googleSearch": {} }),
                ToolCapability::MapsGrounding => json!({ "googleMaps": {} }),
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    let mut generation_config = serde_json::Map::new();
    if request.response_format() == ResponseFormat::StrictJson {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
    }
    if let Some(budget) = request.thinking_budget() {
        generation_config.insert("thinkingConfig".into(), json!({ "thinkingBudget": budget }));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<ChunkSource>,
    maps: Option<ChunkSource>,
}

#[derive(Debug, Deserialize)]
struct ChunkSource {
    uri: Option<String>,
    title: Option<String>,
}

impl ChunkSource {
    fn into_reference(self, label: GroundingLabel) -> Option<GroundingReference> {
        match (self.title, self.uri) {
            (Some(title), Some(uri)) if !title.is_empty() && !uri.is_empty() => {
                Some(GroundingReference { label, title, uri })
            }
            _ => None,
        }
    }
}

pub(crate) fn parse_response_body(body: &str) -> Result<Completion, ProviderError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("undecodable body: {e}")))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(Completion::default());
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let grounding = candidate
        .grounding_metadata
        .map(|metadata| {
            metadata
                .grounding_chunks
                .into_iter()
                .flat_map(|chunk| {
                    let web = chunk
                        .web
                        .and_then(|source| source.into_reference(GroundingLabel::Web));
                    let map = chunk
                        .maps
                        .and_then(|source| source.into_reference(GroundingLabel::Map));
                    web.into_iter().chain(map)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Completion { text, grounding })
}

fn map_error_status(status: StatusCode, headers: &HeaderMap, body: String) -> ProviderError {
    if is_rate_or_quota_error(status, &body) {
        return ProviderError::RateLimited {
            retry_after_secs: parse_retry_after(headers).map(|d| d.as_secs()),
            message: body,
        };
    }
    match status.as_u16() {
        401 | 403 => ProviderError::Auth {
            status: status.as_u16(),
            message: body,
        },
        code => ProviderError::Api {
            status: code,
            message: body,
        },
    }
}

fn is_rate_or_quota_error(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }

    let body_lower = body.to_ascii_lowercase();
    body_lower.contains("resource_exhausted") || body_lower.contains("quota")
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let seconds = (retry_at - Utc::now()).num_seconds().max(0) as u64;
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{DEFAULT_MODEL, REASONING_MODEL};
    use crate::normalize_bytes;
    use reqwest::header::HeaderValue;

    #[test]
    fn request_body_carries_parts_tools_and_system() {
        let request = CompletionRequest::builder(DEFAULT_MODEL)
            .inline(normalize_bytes(b"img", "image/png"))
            .text("describe")
            .system_instruction("be brief")
            .tool(ToolCapability::WebSearch)
            .tool(ToolCapability::MapsGrounding)
            .build()
            .unwrap();

        let body = build_request_body(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "aW1n");
        assert_eq!(parts[1]["text"], "describe");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["tools"][0], json!({ "googleSearch": {} }));
        assert_eq!(body["tools"][1], json!({ "googleMaps": {} }));
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn request_body_strict_json_and_thinking() {
        let strict = CompletionRequest::builder(DEFAULT_MODEL)
            .text("x")
            .response_format(ResponseFormat::StrictJson)
            .build()
            .unwrap();
        let body = build_request_body(&strict);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(body.get("tools").is_none());

        let thinking = CompletionRequest::builder(REASONING_MODEL)
            .text("x")
            .thinking_budget(Some(16_000))
            .build()
            .unwrap();
        let body = build_request_body(&thinking);
        assert_eq!(
            body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            16_000
        );
    }

    #[test]
    fn parse_response_concatenates_text_and_skips_thoughts() {
        let body = r#"{
          "candidates": [{
            "content": {"parts": [
              {"text": "thinking...", "thought": true},
              {"text": "Hello "},
              {"text": "there"}
            ]}
          }]
        }"#;
        let completion = parse_response_body(body).unwrap();
        assert_eq!(completion.text, "Hello there");
        assert!(completion.grounding.is_empty());
    }

    #[test]
    fn parse_response_reads_grounding_chunks() {
        let body = r#"{
          "candidates": [{
            "content": {"parts": [{"text": "ok"}]},
            "groundingMetadata": {"groundingChunks": [
              {"web": {"uri": "https://a.example", "title": "A"}},
              {"maps": {"uri": "https://maps.example/p", "title": "Cafe"}},
              {"web": {"uri": "https://no-title.example"}}
            ]}
          }]
        }"#;
        let completion = parse_response_body(body).unwrap();
        assert_eq!(
            completion.grounding,
            vec![
                GroundingReference {
                    label: GroundingLabel::Web,
                    title: "A".into(),
                    uri: "https://a.example".into(),
                },
                GroundingReference {
                    label: GroundingLabel::Map,
                    title: "Cafe".into(),
                    uri: "https://maps.example/p".into(),
                },
            ]
        );
    }

    #[test]
    fn parse_response_without_candidates_is_empty_text() {
        let completion = parse_response_body(r#"{"promptFeedback": {}}"#).unwrap();
        assert_eq!(completion, Completion::default());
    }

    #[test]
    fn parse_response_rejects_non_json() {
        assert!(matches!(
            parse_response_body("<html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn status_mapping() {
        let headers = HeaderMap::new();
        assert!(matches!(
            map_error_status(StatusCode::FORBIDDEN, &headers, "bad key".into()),
            ProviderError::Auth { status: 403, .. }
        ));
        assert!(matches!(
            map_error_status(
                StatusCode::BAD_REQUEST,
                &headers,
                "RESOURCE_EXHAUSTED".into(),
            ),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            map_error_status(StatusCode::INTERNAL_SERVER_ERROR, &headers, "boom".into()),
            ProviderError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        match map_error_status(StatusCode::TOO_MANY_REQUESTS, &headers, String::new()) {
            ProviderError::RateLimited {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, Some(120)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let client = GeminiClient::new(Some("  ".into())).with_base_url("http://127.0.0.1:9");
        let request = CompletionRequest::builder(DEFAULT_MODEL)
            .text("x")
            .build()
            .unwrap();
        let err = client.complete(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential));
    }

    #[test]
    fn per_call_key_overrides_default() {
        let client = GeminiClient::new(Some("default-key".into()));
        let request = CompletionRequest::builder(DEFAULT_MODEL)
            .api_key(Some("override"))
            .build()
            .unwrap();
        assert_eq!(client.resolve_api_key(&request).unwrap(), "override");

        let request = CompletionRequest::builder(DEFAULT_MODEL).build().unwrap();
        assert_eq!(client.resolve_api_key(&request).unwrap(), "default-key");
    }

    #[test]
    fn debug_masks_default_key() {
        let client = GeminiClient::new(Some("AIza-very-secret".into()));
        assert!(!format!("{client:?}").contains("very-secret"));
    }
}
