use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured outcome of analyzing a capture. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub tags: Vec<String>,
    pub reminder_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// Result used when analysis is unavailable: the input echoed back, nothing extracted.
    pub fn degraded(input: &str) -> Self {
        Self {
            summary: input.to_string(),
            tags: Vec::new(),
            reminder_at: None,
        }
    }
}
