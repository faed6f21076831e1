use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::orchestrator::{
    BackendSettings, LlmConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_FALLBACK_DELAY,
};
use crate::llm_client::{anthropic, gemini, openai, BackendCredentials, BackendKind};

/// Application configuration loaded from environment variables.
/// Fails at startup if no generation backend has credentials.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub llm: LlmConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let credentials = |prefix: &str, default_model: &str, default_base: &str| {
            get(&format!("{prefix}_API_KEY")).map(|api_key| BackendCredentials {
                api_key,
                model: get(&format!("{prefix}_MODEL")).unwrap_or_else(|| default_model.to_string()),
                base_url: get(&format!("{prefix}_BASE_URL"))
                    .unwrap_or_else(|| default_base.to_string()),
            })
        };

        let anthropic = credentials(
            "ANTHROPIC",
            anthropic::DEFAULT_MODEL,
            anthropic::DEFAULT_BASE_URL,
        );
        let openai = credentials("OPENAI", openai::DEFAULT_MODEL, openai::DEFAULT_BASE_URL);
        let gemini = credentials("GEMINI", gemini::DEFAULT_MODEL, gemini::DEFAULT_BASE_URL);

        if anthropic.is_none() && openai.is_none() && gemini.is_none() {
            bail!(
                "At least one of ANTHROPIC_API_KEY, OPENAI_API_KEY or GEMINI_API_KEY must be set"
            );
        }

        let order = match get("LLM_BACKEND_ORDER") {
            Some(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<BackendKind>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()
                .context("LLM_BACKEND_ORDER must be a comma-separated list of backends")?,
            None => BackendKind::DEFAULT_ORDER.to_vec(),
        };

        let attempt_timeout = match get("LLM_ATTEMPT_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("LLM_ATTEMPT_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => DEFAULT_ATTEMPT_TIMEOUT,
        };

        let fallback_delay = match get("LLM_FALLBACK_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .context("LLM_FALLBACK_DELAY_MS must be a whole number of milliseconds")?,
            ),
            None => DEFAULT_FALLBACK_DELAY,
        };

        Ok(Config {
            port: get("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            llm: LlmConfig {
                anthropic,
                openai,
                gemini,
                settings: BackendSettings {
                    order,
                    attempt_timeout,
                    fallback_delay,
                },
            },
        })
    }
}
