//! Provider-agnostic completion contract.
//!
//! Strict JSON output and tool capabilities are mutually exclusive in the
//! underlying provider, so [`CompletionRequestBuilder::build`] refuses to
//! produce a request that asks for both. Callers that need tools coerce the
//! free-text answer into structure themselves (see [`crate::extract`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{InlinePayload, ProviderError};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const REASONING_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_THINKING_BUDGET: u32 = 16_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Inline(InlinePayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCapability {
    WebSearch,
    MapsGrounding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    FreeText,
    StrictJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundingLabel {
    Web,
    Map,
}

impl std::fmt::Display for GroundingLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "Web"),
            Self::Map => write!(f, "Map"),
        }
    }
}

/// A citation the provider attached to substantiate part of its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReference {
    pub label: GroundingLabel,
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Best-effort answer text; empty when the provider produced none.
    pub text: String,
    pub grounding: Vec<GroundingReference>,
}

/// A single-shot completion request. Construct through [`CompletionRequest::builder`].
#[derive(Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    model: String,
    parts: Vec<ContentPart>,
    system_instruction: Option<String>,
    tools: Vec<ToolCapability>,
    response_format: ResponseFormat,
    thinking_budget: Option<u32>,
    api_key: Option<String>,
}

impl CompletionRequest {
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder {
            request: Self {
                model: model.into(),
                parts: Vec::new(),
                system_instruction: None,
                tools: Vec::new(),
                response_format: ResponseFormat::FreeText,
                thinking_budget: None,
                api_key: None,
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn tools(&self) -> &[ToolCapability] {
        &self.tools
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    pub fn thinking_budget(&self) -> Option<u32> {
        self.thinking_budget
    }

    /// Per-call credential override.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Concatenated text parts, handy for logging and test assertions.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Inline(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("model", &self.model)
            .field("parts", &self.parts.len())
            .field("system_instruction", &self.system_instruction.is_some())
            .field("tools", &self.tools)
            .field("response_format", &self.response_format)
            .field("thinking_budget", &self.thinking_budget)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.request.parts.push(ContentPart::Text(text.into()));
        self
    }

    pub fn inline(mut self, payload: InlinePayload) -> Self {
        self.request.parts.push(ContentPart::Inline(payload));
        self
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.request.system_instruction = Some(instruction.into());
        self
    }

    pub fn tool(mut self, tool: ToolCapability) -> Self {
        if !self.request.tools.contains(&tool) {
            self.request.tools.push(tool);
        }
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.request.response_format = format;
        self
    }

    pub fn thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.request.thinking_budget = budget;
        self
    }

    /// Blank keys are ignored so the provider's configured default applies.
    pub fn api_key(mut self, api_key: Option<&str>) -> Self {
        self.request.api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    pub fn build(self) -> Result<CompletionRequest, ProviderError> {
        let request = self.request;
        if request.response_format == ResponseFormat::StrictJson && !request.tools.is_empty() {
            return Err(ProviderError::IncompatibleOptions);
        }
        Ok(request)
    }
}

/// Which model to answer with, and whether it is the reasoning variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model: String,
    pub reasoning_model: String,
    pub thinking_budget: u32,
}

impl ModelChoice {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reasoning_model: REASONING_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
        }
    }

    pub fn with_reasoning(mut self, reasoning_model: impl Into<String>, budget: u32) -> Self {
        self.reasoning_model = reasoning_model.into();
        self.thinking_budget = budget;
        self
    }

    pub fn is_reasoning(&self) -> bool {
        self.model == self.reasoning_model
    }

    /// Elevated budget for the reasoning variant, nothing otherwise.
    pub fn thinking_budget(&self) -> Option<u32> {
        self.is_reasoning().then_some(self.thinking_budget)
    }
}

impl Default for ModelChoice {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

/// The external generative-AI provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion. Ordinary "no answer" cases yield an empty text,
    /// only transport/auth/quota problems are errors.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

#[async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for std::sync::Arc<P> {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        (**self).complete(request).await
    }
}
