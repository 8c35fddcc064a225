//! Settings loaded from `~/.config/nomorize/config.toml`.
//!
//! Every section and field is optional; anything missing takes its default,
//! and a missing file means all defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nmz_core::AssistantTone;
use serde::{Deserialize, Serialize};

/// Fills `provider.api_key` when the file leaves it empty.
pub const API_KEY_ENV: &str = "NOMORIZE_API_KEY";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_REASONING_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_THINKING_BUDGET: u32 = 16_000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NomorizeConfig {
    pub assistant: AssistantConfig,
    pub provider: ProviderConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// How the assistant addresses you. Empty means "the user".
    pub user_name: String,
    /// friendly, professional, concise, enthusiastic or explanatory.
    pub tone: String,
    /// Model used for chat replies. Set it to the reasoning model for deeper answers.
    pub model: String,
    pub enable_reminders: bool,
    /// Analyze new captures automatically.
    pub enable_background_analysis: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            user_name: String::new(),
            tone: AssistantTone::default().as_str().to_string(),
            model: DEFAULT_MODEL.to_string(),
            enable_reminders: true,
            enable_background_analysis: true,
        }
    }
}

impl AssistantConfig {
    /// Unknown tone names fall back to friendly.
    pub fn tone(&self) -> AssistantTone {
        AssistantTone::parse_lenient(&self.tone)
    }

    pub fn user_name(&self) -> Option<&str> {
        Some(self.user_name.trim()).filter(|name| !name.is_empty())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub reasoning_model: String,
    pub thinking_budget: u32,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.trim()).filter(|key| !key.is_empty())
    }

    pub fn redacted_api_key(&self) -> String {
        mask_api_key(&self.api_key)
    }

    pub fn redacted_for_display(&self) -> Self {
        let mut redacted = self.clone();
        redacted.api_key = redacted.redacted_api_key();
        redacted
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.redacted_api_key())
            .field("reasoning_model", &self.reasoning_model)
            .field("thinking_budget", &self.thinking_budget)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Display for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base_url=\"{}\", api_key=\"{}\", reasoning_model=\"{}\", thinking_budget={}, timeout_secs={}",
            self.base_url,
            self.redacted_api_key(),
            self.reasoning_model,
            self.thinking_budget,
            self.timeout_secs
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Drop image attachments older than `retention_days`.
    pub auto_delete: bool,
    pub retention_days: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            auto_delete: false,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl NomorizeConfig {
    /// Load from [`Self::config_path`], then apply [`API_KEY_ENV`].
    ///
    /// Returns defaults if the file does not exist or if the config
    /// directory cannot be determined (e.g., no HOME in containers).
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) => Self::load_from(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_api_key(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    /// Load a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// The file's key wins; the environment only fills a blank one.
    pub fn apply_env_api_key(&mut self, env_key: Option<String>) {
        if self.provider.api_key().is_some() {
            return;
        }
        if let Some(key) = env_key.filter(|key| !key.trim().is_empty()) {
            self.provider.api_key = key.trim().to_string();
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let dir = crate::paths::config_dir().context("Failed to determine config directory")?;
        Ok(dir.join("config.toml"))
    }

    /// Copy with the API key masked, for `config show`.
    pub fn redacted_for_display(&self) -> Self {
        Self {
            provider: self.provider.redacted_for_display(),
            ..self.clone()
        }
    }

    /// Default config TOML with comments, written by `config init`.
    pub fn default_template() -> String {
        r#"# Nomorize configuration
# Location: ~/.config/nomorize/config.toml
#
# Every key is optional. Missing keys take the values shown here.

[assistant]
user_name = ""                      # How the assistant addresses you
tone = "friendly"                   # friendly | professional | concise | enthusiastic | explanatory
model = "gemini-2.5-flash"          # Use "gemini-3-pro-preview" for deeper (slower) answers
enable_reminders = true             # Detect upcoming events in new captures
enable_background_analysis = true   # Analyze new captures automatically

[provider]
base_url = "https://generativelanguage.googleapis.com"
api_key = ""                        # Or set NOMORIZE_API_KEY
reasoning_model = "gemini-3-pro-preview"
thinking_budget = 16000             # Only sent when the reasoning model is selected
timeout_secs = 60

[media]
auto_delete = false
retention_days = 30
"#
        .to_string()
    }

    /// Write [`Self::default_template`] to `path`, refusing to overwrite.
    pub fn save_default_template(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, Self::default_template())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

fn mask_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return String::new();
    }

    let char_count = api_key.chars().count();
    let prefix: String = api_key.chars().take(3).collect();
    let suffix: String = api_key.chars().skip(char_count.saturating_sub(4)).collect();

    if char_count <= 4 {
        format!("***{suffix}")
    } else {
        format!("{prefix}...{suffix}")
    }
}
