use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::controller::ControllerConfig;
use crate::provider::DEFAULT_GOOGLE_URL;
use crate::request::{JoinPolicy, TranslationRequest, AUTO_LANG};

#[derive(Debug, Clone)]
pub struct Config {
    // Languages
    pub source_lang: String,
    pub target_lang: String,

    // Chunking and retries
    pub max_chars: usize,
    pub retries: u32,
    pub retry_backoff: f64,
    pub preserve_format: bool,
    pub join_policy: JoinPolicy,
    pub concurrency: usize,

    // Provider
    pub provider_url: String,
    pub http_timeout: Duration,

    // Page controller
    pub batch_size: usize,
    pub debounce: Duration,

    // Server
    pub host: String,
    pub port: u16,
}

/// Read an optional variable, parsing it when set.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

fn string_var(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn bool_var(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("Invalid value for {}: {:?} (expected true/false)", key, raw),
        },
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from the environment; every key is optional.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Languages
            source_lang: string_var("ENVI_SOURCE_LANG", AUTO_LANG),
            target_lang: string_var("ENVI_TARGET_LANG", "vi"),

            // Chunking and retries
            max_chars: parse_var("ENVI_MAX_CHARS", TranslationRequest::DEFAULT_MAX_CHARS)?,
            retries: parse_var("ENVI_RETRIES", TranslationRequest::DEFAULT_RETRIES)?,
            retry_backoff: parse_var(
                "ENVI_RETRY_BACKOFF",
                TranslationRequest::DEFAULT_BACKOFF_SECONDS,
            )?,
            preserve_format: bool_var("ENVI_PRESERVE_FORMAT", true)?,
            join_policy: parse_var("ENVI_JOIN_POLICY", JoinPolicy::Space)?,
            concurrency: parse_var("ENVI_CONCURRENCY", 4)?,

            // Provider
            provider_url: string_var("ENVI_PROVIDER_URL", DEFAULT_GOOGLE_URL),
            http_timeout: Duration::from_secs(parse_var("ENVI_HTTP_TIMEOUT_SECS", 30)?),

            // Page controller
            batch_size: parse_var("ENVI_BATCH_SIZE", ControllerConfig::DEFAULT_BATCH_SIZE)?,
            debounce: Duration::from_millis(parse_var(
                "ENVI_DEBOUNCE_MS",
                ControllerConfig::DEFAULT_DEBOUNCE_MS,
            )?),

            // Server
            host: string_var("ENVI_HOST", "127.0.0.1"),
            port: parse_var("PORT", 8000)?,
        })
    }

    /// The request used when a caller does not override anything.
    pub fn translation_request(&self) -> TranslationRequest {
        TranslationRequest::new(&self.source_lang, &self.target_lang)
            .with_max_chars(self.max_chars)
            .with_retries(self.retries)
            .with_backoff_base_seconds(self.retry_backoff)
            .with_preserve_format(self.preserve_format)
            .with_join_policy(self.join_policy)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            batch_size: self.batch_size.max(1),
            debounce: self.debounce,
        }
    }
}
