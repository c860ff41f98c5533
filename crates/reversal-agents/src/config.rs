use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::SessionConfig;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat-completions endpoint backing language-model seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL, e.g. `http://localhost:8080/v1`.
    pub url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on any single HTTP exchange. The phase deadline minus
    /// the provider margin normally cuts a call off well before this.
    pub http_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("REVERSAL_PROVIDER_URL")
                .unwrap_or_else(|_| "http://localhost:8080/v1".into()),
            model: std::env::var("REVERSAL_PROVIDER_MODEL")
                .unwrap_or_else(|_| "default".into()),
            api_key: std::env::var("REVERSAL_PROVIDER_API_KEY").ok(),
            max_tokens: 64,
            temperature: 0.7,
            http_timeout_ms: 10_000,
        }
    }
}

impl ProviderConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }
}

/// Everything the binary needs: the session itself plus the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub provider: ProviderConfig,
}

impl AppConfig {
    /// Load from `path` (defaults when `None`), apply environment
    /// overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config
            .session
            .validate()
            .context("Invalid session configuration")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `REVERSAL_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(seed) = lookup("REVERSAL_SEED") {
            self.session.seed = seed
                .trim()
                .parse()
                .with_context(|| format!("REVERSAL_SEED is not an integer: {seed:?}"))?;
        }
        if let Some(rounds) = lookup("REVERSAL_ROUNDS") {
            let rounds = rounds
                .trim()
                .parse()
                .with_context(|| format!("REVERSAL_ROUNDS is not an integer: {rounds:?}"))?;
            self.session.total_rounds = Some(rounds);
        }
        if let Some(url) = lookup("REVERSAL_PROVIDER_URL") {
            self.provider.url = url;
        }
        if let Some(model) = lookup("REVERSAL_PROVIDER_MODEL") {
            self.provider.model = model;
        }
        if let Some(key) = lookup("REVERSAL_PROVIDER_API_KEY") {
            self.provider.api_key = Some(key);
        }
        Ok(())
    }
}
