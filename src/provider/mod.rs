//! Translation providers
//!
//! A provider is the single-call, length-limited primitive the engine wraps:
//! it translates one piece of text and either succeeds or reports a
//! [`ProviderError`] that the retry loop classifies as transient or permanent.

mod google;
mod mock;

pub use google::{GoogleWebProvider, DEFAULT_GOOGLE_URL};
pub use mock::{MockMode, MockProvider};

use async_trait::async_trait;

use crate::error::ProviderError;

/// Generic trait for remote translation backends
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate `text` from `source` (a language code or `"auto"`) to `target`.
    async fn translate(&self, text: &str, source: &str, target: &str)
        -> Result<String, ProviderError>;

    /// Display name → language code pairs the backend accepts.
    ///
    /// Backends without a listing endpoint keep the default, and callers fall
    /// back to the built-in catalog.
    async fn supported_languages(&self) -> Result<Vec<(String, String)>, ProviderError> {
        Err(ProviderError::transport(format!(
            "{} does not publish a language list",
            self.provider_name()
        )))
    }

    /// Name used in logs
    fn provider_name(&self) -> &str;
}
