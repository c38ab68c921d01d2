use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::state::Framework;
use crate::util::is_local_endpoint_url;

pub const DEFAULT_API_URL: &str = "https://gen.pollinations.ai/v1/chat/completions";
pub const DEFAULT_BALANCE_URL: &str = "https://gen.pollinations.ai/account/balance";
pub const DEFAULT_MODEL: &str = "claude";
pub const DEFAULT_PREVIEW_DEBOUNCE_MS: u64 = 1_000;

/// Model ids the console advertises, best first.
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("claude-large", "Claude Opus 4.5"),
    ("claude", "Claude Sonnet 4.5"),
    ("gemini-large", "Gemini 3.0 Pro"),
    ("claude-fast", "Claude Haiku 4.5"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub balance_url: String,
    pub framework: Framework,
    pub store_path: PathBuf,
    pub preview_dir: PathBuf,
    pub preview_debounce: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url =
            std::env::var("PAIRPAD_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let balance_url = std::env::var("PAIRPAD_BALANCE_URL")
            .unwrap_or_else(|_| DEFAULT_BALANCE_URL.to_string());
        let api_key = std::env::var("PAIRPAD_API_KEY").ok().and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });
        let model = std::env::var("PAIRPAD_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let framework = std::env::var("PAIRPAD_FRAMEWORK")
            .ok()
            .and_then(|v| Framework::parse(&v))
            .unwrap_or_default();

        let cwd = std::env::current_dir()?;
        let store_path = std::env::var("PAIRPAD_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cwd.join(".pairpad").join("sessions.json"));
        let preview_dir = std::env::var("PAIRPAD_PREVIEW_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cwd.join(".pairpad").join("preview"));
        let preview_debounce = std::env::var("PAIRPAD_PREVIEW_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|ms| ms.clamp(50, 10_000))
            .unwrap_or(DEFAULT_PREVIEW_DEBOUNCE_MS);

        Ok(Self {
            api_key,
            model,
            api_url,
            balance_url,
            framework,
            store_path,
            preview_dir,
            preview_debounce: Duration::from_millis(preview_debounce),
        })
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("PAIRPAD_API_URL", &self.api_url),
            ("PAIRPAD_BALANCE_URL", &self.balance_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("Invalid {name} '{url}': expected http:// or https:// URL");
            }
        }

        if self.model.trim().is_empty() {
            bail!("PAIRPAD_MODEL must not be empty");
        }

        if !KNOWN_MODELS.iter().any(|(id, _)| *id == self.model) {
            tracing::warn!(model = %self.model, "model is not in the known model list");
        }

        Ok(())
    }

    /// Whether a turn may be sent without a key. Only local endpoints qualify.
    pub fn credential_optional(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    /// Config pointing at a local endpoint with in-tree paths. Used by tests.
    pub fn local(api_url: &str) -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: api_url.to_string(),
            balance_url: format!("{}/account/balance", api_url.trim_end_matches('/')),
            framework: Framework::React,
            store_path: PathBuf::from(".pairpad/sessions.json"),
            preview_dir: PathBuf::from(".pairpad/preview"),
            preview_debounce: Duration::from_millis(DEFAULT_PREVIEW_DEBOUNCE_MS),
        }
    }
}
