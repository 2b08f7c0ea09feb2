//! Single-chunk provider calls with bounded retries.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ProviderError, TranslateError};
use crate::provider::TranslationProvider;
use crate::request::TranslationRequest;
use crate::retry::{with_retry_if, RetryConfig, RetryFailure};
use crate::segment::Chunk;

/// Result of translating one chunk.
///
/// Exactly one of `translated` / `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub chunk: Chunk,
    pub translated: Option<String>,
    pub error: Option<TranslateError>,
    /// Provider calls made for this chunk (0 for blank chunks)
    pub attempts: u32,
}

impl TranslationOutcome {
    fn success(chunk: Chunk, translated: String, attempts: u32) -> Self {
        Self {
            chunk,
            translated: Some(translated),
            error: None,
            attempts,
        }
    }

    fn failure(chunk: Chunk, error: TranslateError, attempts: u32) -> Self {
        Self {
            chunk,
            translated: None,
            error: Some(error),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Wraps a provider with the retry/backoff policy of a [`TranslationRequest`].
#[derive(Clone)]
pub struct ResilientCaller {
    provider: Arc<dyn TranslationProvider>,
    concurrency: usize,
}

impl ResilientCaller {
    /// Chunks dispatched at once by [`ResilientCaller::call_many`] unless configured.
    pub const DEFAULT_CONCURRENCY: usize = 4;

    pub fn new(provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            provider,
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of provider calls in flight during `call_many`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn provider(&self) -> &Arc<dyn TranslationProvider> {
        &self.provider
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Translate one chunk, retrying transient failures.
    ///
    /// Up to `request.retries` retries follow the first attempt, the n-th
    /// attempt (n ≥ 2) waiting `backoff_base_seconds * 2^(n-2)`. A permanent
    /// failure stops at once.
    pub async fn call(&self, chunk: Chunk, request: &TranslationRequest) -> TranslationOutcome {
        if chunk.is_blank() {
            let text = chunk.text.clone();
            return TranslationOutcome::success(chunk, text, 0);
        }

        let config = RetryConfig::from_request(request);
        let operation_name = format!("{} chunk {}", self.provider.provider_name(), chunk.index);

        let result = with_retry_if(
            &config,
            &operation_name,
            || {
                self.provider
                    .translate(&chunk.text, &request.source_lang, &request.target_lang)
            },
            ProviderError::is_transient,
        )
        .await;

        match result {
            Ok(retried) => TranslationOutcome::success(chunk, retried.value, retried.attempts),
            Err(RetryFailure::NotRetryable { error, attempts }) => {
                warn!(
                    "Chunk {} rejected by provider, not retrying: {}",
                    chunk.index, error
                );
                TranslationOutcome::failure(chunk, TranslateError::PermanentFailure(error), attempts)
            }
            Err(RetryFailure::Exhausted {
                last_error,
                attempts,
            }) => TranslationOutcome::failure(
                chunk,
                TranslateError::RetryExhausted {
                    attempts,
                    last: last_error,
                },
                attempts,
            ),
        }
    }

    /// Translate many chunks, possibly from different texts.
    ///
    /// Calls run concurrently up to the configured bound; outcomes come back
    /// in input order regardless of completion order.
    pub async fn call_many(
        &self,
        chunks: Vec<Chunk>,
        request: &TranslationRequest,
    ) -> Vec<TranslationOutcome> {
        debug!(
            "Dispatching {} chunks ({} in flight)",
            chunks.len(),
            self.concurrency
        );

        stream::iter(chunks)
            .map(|chunk| self.call(chunk, request))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
