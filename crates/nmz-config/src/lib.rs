//! User configuration (`~/.config/nomorize/config.toml`) and XDG paths.

pub mod config;
pub mod paths;

pub use config::{API_KEY_ENV, AssistantConfig, MediaConfig, NomorizeConfig, ProviderConfig};
