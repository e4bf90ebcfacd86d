//! Configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `config.toml` that controls
//! history paging, the fallback reply, and which response generator to use.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Tuning for the conversation sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Messages fetched per initial load and per history page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Reply stored when generation fails or returns blank text.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Capacity of the engine's change-event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_page_size() -> u32 {
    20
}

fn default_fallback_reply() -> String {
    "I'm having trouble generating a response right now. Please try again later.".to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fallback_reply: default_fallback_reply(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Which backend produces AI replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    Gemini,
    Canned,
}

/// Response generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub provider: GeneratorKind,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_AI_API_KEY".to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorKind::default(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}
