//! Mock provider for testing
//!
//! Deterministic, network-free provider used by the test suites and by the
//! `--provider mock` option of the CLI. Failures can be scripted to exercise the retry
//! loop and batch fault isolation.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::TranslationProvider;
use crate::error::ProviderError;

/// Mock translation modes
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Return the input unchanged
    Identity,
    /// Uppercase the input
    Uppercase,
    /// Append the target language: "hello" → "hello_vi"
    Suffix,
    /// Every call fails with this error
    Error(ProviderError),
}

/// Scripted, call-recording provider
#[derive(Debug)]
pub struct MockProvider {
    mode: MockMode,
    delay: Duration,
    /// The first `fail_first` calls fail with `fail_first_error`
    fail_first: u32,
    fail_first_error: Option<ProviderError>,
    /// Texts containing the needle always fail
    fail_containing: Vec<(String, ProviderError)>,
    calls: AtomicU32,
    log: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            fail_first: 0,
            fail_first_error: None,
            fail_containing: Vec::new(),
            calls: AtomicU32::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn identity() -> Self {
        Self::new(MockMode::Identity)
    }

    /// Simulated latency per call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `times` calls with `error`, then behave per mode.
    pub fn failing_first(mut self, times: u32, error: ProviderError) -> Self {
        self.fail_first = times;
        self.fail_first_error = Some(error);
        self
    }

    /// Fail every call whose text contains `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>, error: ProviderError) -> Self {
        self.fail_containing.push((needle.into(), error));
        self
    }

    /// Total number of calls received
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts received, in call order
    pub fn received(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn apply(&self, text: &str, target: &str) -> Result<String, ProviderError> {
        match &self.mode {
            MockMode::Identity => Ok(text.to_string()),
            MockMode::Uppercase => Ok(text.to_uppercase()),
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Error(error) => Err(error.clone()),
        }
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate(
        &self,
        text: &str,
        _source: &str,
        target: &str,
    ) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.log.lock() {
            log.push(text.to_string());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if call < self.fail_first {
            if let Some(error) = &self.fail_first_error {
                return Err(error.clone());
            }
        }

        if let Some((_, error)) = self
            .fail_containing
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
        {
            return Err(error.clone());
        }

        self.apply(text, target)
    }

    async fn supported_languages(&self) -> Result<Vec<(String, String)>, ProviderError> {
        Ok(vec![
            ("English".to_string(), "en".to_string()),
            ("Vietnamese".to_string(), "vi".to_string()),
        ])
    }

    fn provider_name(&self) -> &str {
        "Mock Provider"
    }
}
