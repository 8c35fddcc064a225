use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// What kind of capture a memory started out as. Fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum MemoryKind {
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "VOICE")]
    Voice,
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "VIDEO_DESC")]
    #[value(name = "video")]
    VideoDescription,
    #[serde(rename = "OCR")]
    Ocr,
}

impl MemoryKind {
    /// Wire name, also used in prompts sent to the assistant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Voice => "VOICE",
            Self::Image => "IMAGE",
            Self::VideoDescription => "VIDEO_DESC",
            Self::Ocr => "OCR",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Ok(Self::Text),
            "VOICE" => Ok(Self::Voice),
            "IMAGE" => Ok(Self::Image),
            "VIDEO_DESC" | "VIDEO" => Ok(Self::VideoDescription),
            "OCR" => Ok(Self::Ocr),
            _ => Err(CoreError::UnknownMemoryKind(s.to_string())),
        }
    }
}

/// Persona tone for the conversational assistant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantTone {
    #[default]
    Friendly,
    Professional,
    Concise,
    Enthusiastic,
    Explanatory,
}

impl AssistantTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Professional => "professional",
            Self::Concise => "concise",
            Self::Enthusiastic => "enthusiastic",
            Self::Explanatory => "explanatory",
        }
    }

    /// Parse a stored tone name. Unknown values fall back to [`AssistantTone::Friendly`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "professional" => Self::Professional,
            "concise" => Self::Concise,
            "enthusiastic" => Self::Enthusiastic,
            "explanatory" => Self::Explanatory,
            _ => Self::Friendly,
        }
    }
}

impl std::fmt::Display for AssistantTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format for CLI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
