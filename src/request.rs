use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TranslateError;

/// Source language value that asks the provider to detect the language.
pub const AUTO_LANG: &str = "auto";

/// How chunks are glued back together when formatting is not preserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Every boundary becomes a single space.
    #[default]
    Space,
    /// Paragraph boundaries become a single newline, all others a space.
    Newline,
}

impl std::str::FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "space" => Ok(JoinPolicy::Space),
            "newline" => Ok(JoinPolicy::Newline),
            other => Err(format!("unknown join policy '{}'", other)),
        }
    }
}

/// Immutable configuration for one logical translation call (single text or batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_lang: String,
    pub target_lang: String,
    /// Largest chunk, in characters, sent to the provider in one call
    pub max_chars: usize,
    /// Additional attempts after the first failure
    pub retries: u32,
    /// Delay before the first retry; doubles for every further retry
    pub backoff_base_seconds: f64,
    pub preserve_format: bool,
    #[serde(default)]
    pub join_policy: JoinPolicy,
}

impl TranslationRequest {
    pub const DEFAULT_MAX_CHARS: usize = 4500;
    pub const DEFAULT_RETRIES: u32 = 3;
    pub const DEFAULT_BACKOFF_SECONDS: f64 = 1.0;

    /// A request with the documented defaults for the given language pair.
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            max_chars: Self::DEFAULT_MAX_CHARS,
            retries: Self::DEFAULT_RETRIES,
            backoff_base_seconds: Self::DEFAULT_BACKOFF_SECONDS,
            preserve_format: true,
            join_policy: JoinPolicy::Space,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff_base_seconds(mut self, seconds: f64) -> Self {
        self.backoff_base_seconds = seconds;
        self
    }

    pub fn with_preserve_format(mut self, preserve_format: bool) -> Self {
        self.preserve_format = preserve_format;
        self
    }

    pub fn with_join_policy(mut self, join_policy: JoinPolicy) -> Self {
        self.join_policy = join_policy;
        self
    }

    pub fn with_languages(
        mut self,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        self.source_lang = source_lang.into();
        self.target_lang = target_lang.into();
        self
    }

    /// Same parameters, different target language.
    pub fn for_target(&self, target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            ..self.clone()
        }
    }

    /// Total number of provider calls allowed per chunk.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::try_from_secs_f64(self.backoff_base_seconds.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Reject parameters the segmenter and the retry loop cannot honour.
    pub fn validate(&self) -> Result<(), TranslateError> {
        if self.max_chars == 0 {
            return Err(TranslateError::Segmentation(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if !self.backoff_base_seconds.is_finite() || self.backoff_base_seconds < 0.0 {
            return Err(TranslateError::Segmentation(format!(
                "backoff_base_seconds must be a non-negative number, got {}",
                self.backoff_base_seconds
            )));
        }
        if self.target_lang.trim().is_empty() {
            return Err(TranslateError::Segmentation(
                "target_lang must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TranslationRequest {
    fn default() -> Self {
        Self::new(AUTO_LANG, "vi")
    }
}
