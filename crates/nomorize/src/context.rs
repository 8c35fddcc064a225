use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use nmz_config::{NomorizeConfig, ProviderConfig};
use nmz_core::Memory;
use nmz_cortex::analyzer::parse_reminder;
use nmz_cortex::{CompletionProvider, CurationOptions, GeminiClient, ModelChoice};
use nmz_store::{ChatLog, MemoryStore};
use tracing::{info, warn};

/// Everything a memory or chat command needs, loaded once per invocation.
pub(crate) struct AppContext {
    pub config: NomorizeConfig,
    pub store: MemoryStore,
    pub chat: ChatLog,
    pub provider: Arc<dyn CompletionProvider>,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let config = NomorizeConfig::load()?;
        let store = MemoryStore::default();
        let chat = ChatLog::new(store.base_dir());
        let provider = create_provider(&config.provider)?;

        let context = Self {
            config,
            store,
            chat,
            provider,
        };
        context.enforce_media_retention()?;
        Ok(context)
    }

    pub fn provider(&self) -> &dyn CompletionProvider {
        self.provider.as_ref()
    }

    pub fn curation_options(&self) -> CurationOptions {
        CurationOptions {
            reminders_enabled: self.config.assistant.enable_reminders,
            ..CurationOptions::default()
        }
    }

    pub fn model_choice(&self, model_override: Option<String>) -> ModelChoice {
        let model = model_override.unwrap_or_else(|| self.config.assistant.model.clone());
        ModelChoice::new(model).with_reasoning(
            self.config.provider.reasoning_model.clone(),
            self.config.provider.thinking_budget,
        )
    }

    pub fn user_name(&self) -> Option<&str> {
        self.config.assistant.user_name()
    }

    fn enforce_media_retention(&self) -> Result<()> {
        if !self.config.media.auto_delete {
            return Ok(());
        }
        let cutoff =
            Utc::now() - chrono::Duration::days(i64::from(self.config.media.retention_days));
        let purged = self.store.purge_media_before(cutoff)?;
        if purged > 0 {
            info!(
                purged,
                retention_days = self.config.media.retention_days,
                "expired media removed"
            );
        }
        Ok(())
    }
}

/// Without an API key every call fails with a missing-credential error, so
/// each assistant feature answers with its failure fallback.
pub(crate) fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
    let api_key = config.api_key().map(str::to_string);
    if api_key.is_none() {
        warn!("no API key configured; assistant features will report failures");
    }

    let client = GeminiClient::new(api_key)
        .with_base_url(&config.base_url)
        .with_timeout(Duration::from_secs(config.timeout_secs))?;
    Ok(Arc::new(client))
}

pub(crate) fn parse_when(raw: &str) -> Result<DateTime<Utc>> {
    match parse_reminder(raw) {
        Some(at) => Ok(at),
        None => bail!(
            "invalid time '{raw}' (expected RFC 3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD)"
        ),
    }
}

pub(crate) fn resolve_by_prefix<'a>(memories: &'a [Memory], prefix: &str) -> Result<&'a Memory> {
    let normalized = prefix.to_ascii_lowercase();
    if let Some(exact) = memories
        .iter()
        .find(|memory| memory.id().to_ascii_lowercase() == normalized)
    {
        return Ok(exact);
    }
    let matches: Vec<&Memory> = memories
        .iter()
        .filter(|memory| memory.id().to_ascii_lowercase().starts_with(&normalized))
        .collect();

    match matches.as_slice() {
        [] => bail!("No memory matching prefix '{prefix}'."),
        [memory] => Ok(*memory),
        many => {
            let choices = many
                .iter()
                .map(|memory| short_id(memory.id(), 10))
                .collect::<Vec<_>>()
                .join(", ");
            bail!("Ambiguous prefix '{prefix}'. Matches: {choices}");
        }
    }
}

pub(crate) fn short_id(id: &str, len: usize) -> String {
    id.chars().take(len).collect()
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// First line of the content, for one-line listings.
pub(crate) fn headline(content: &str, max_chars: usize) -> String {
    let first = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    truncate_chars(first.trim(), max_chars)
}
