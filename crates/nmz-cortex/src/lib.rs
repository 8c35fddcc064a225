//! The assistant pipeline: attachment normalization, the completion gateway
//! and the operations built on it (analysis, link suggestions, briefings,
//! chat replies, selection summaries and draft curation).
//!
//! None of the pipeline operations return errors. Each degrades to a
//! documented fallback value and logs a warning instead.

pub mod analyzer;
pub mod briefing;
pub mod connections;
pub mod curate;
mod error;
pub mod extract;
pub mod gateway;
mod gemini;
pub mod normalize;
pub mod responder;
pub mod summarize;

#[cfg(test)]
mod stub_client;

pub use analyzer::{AnalysisRequest, analyze_content};
pub use briefing::{Briefing, generate_briefing};
pub use connections::find_connections;
pub use curate::{
    AnalyzingGuard, CurationOptions, CurationReport, MemoryDraft, apply_analysis, curate,
};
pub use error::{AttachmentReadError, ProviderError};
pub use gateway::{
    Completion, CompletionProvider, CompletionRequest, GroundingLabel, GroundingReference,
    ModelChoice, ResponseFormat, ToolCapability,
};
pub use gemini::{DEFAULT_BASE_URL, GeminiClient};
pub use normalize::{InlinePayload, is_image_path, load_attachment, normalize_bytes};
pub use responder::{ChatRequest, generate_response};
pub use summarize::summarize_selection;
