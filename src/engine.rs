//! Segment → call → reassemble, for one text or many.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::caller::{ResilientCaller, TranslationOutcome};
use crate::error::TranslateError;
use crate::provider::TranslationProvider;
use crate::reassemble::reassemble;
use crate::request::TranslationRequest;
use crate::segment::segment;

/// Per-item results of a batch, in input order.
pub type BatchResults = Vec<Result<String, TranslateError>>;

/// Anything that can translate an ordered batch of independent texts.
///
/// The outer error means the whole dispatch failed (nothing was translated);
/// inner errors are per-item and never affect sibling items.
#[async_trait]
pub trait BatchTranslator: Send + Sync {
    async fn translate_batch(
        &self,
        texts: &[String],
        request: &TranslationRequest,
    ) -> Result<BatchResults, TranslateError>;
}

/// Reliable, unbounded-size translation on top of a length-limited provider.
#[derive(Clone)]
pub struct TranslationEngine {
    caller: ResilientCaller,
}

impl TranslationEngine {
    pub fn new(provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            caller: ResilientCaller::new(provider),
        }
    }

    /// Bound the number of chunk calls in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.caller = self.caller.with_concurrency(concurrency);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.caller.provider().provider_name()
    }

    pub fn provider(&self) -> &Arc<dyn TranslationProvider> {
        self.caller.provider()
    }

    /// Translate a single text, all-or-nothing.
    ///
    /// Empty input is a no-op returning an empty string.
    pub async fn translate(
        &self,
        text: &str,
        request: &TranslationRequest,
    ) -> Result<String, TranslateError> {
        request.validate()?;

        let chunks = segment(text, request.max_chars, request.preserve_format);
        if chunks.is_empty() {
            return Ok(String::new());
        }

        debug!(
            "Translating {} chars in {} chunk(s) {} -> {}",
            text.chars().count(),
            chunks.len(),
            request.source_lang,
            request.target_lang
        );

        let outcomes = self.caller.call_many(chunks, request).await;
        let result = reassemble(outcomes, request.preserve_format, request.join_policy);
        if let Err(e) = &result {
            warn!("Translation failed: {}", e);
        }
        result
    }

    /// Translate independent texts sharing one request.
    ///
    /// One result per text, in input order.
    pub async fn translate_batch(&self, texts: &[String], request: &TranslationRequest) -> BatchResults {
        let items: Vec<(&str, &TranslationRequest)> =
            texts.iter().map(|text| (text.as_str(), request)).collect();
        self.translate_items(&items).await
    }

    /// Translate independent texts, each with its own request.
    ///
    /// Chunks of every item are dispatched as one flattened stream and
    /// regrouped by item before reassembly, so one item's failure stays
    /// confined to that item's result.
    pub async fn translate_items(&self, items: &[(&str, &TranslationRequest)]) -> BatchResults {
        let mut results: Vec<Option<Result<String, TranslateError>>> = vec![None; items.len()];
        let mut jobs = Vec::new();

        for (slot, (text, request)) in items.iter().enumerate() {
            if let Err(e) = request.validate() {
                results[slot] = Some(Err(e));
                continue;
            }
            let chunks = segment(text, request.max_chars, request.preserve_format);
            if chunks.is_empty() {
                results[slot] = Some(Ok(String::new()));
                continue;
            }
            jobs.extend(chunks.into_iter().map(|chunk| (slot, chunk, *request)));
        }

        debug!(
            "Batch of {} item(s) flattened into {} chunk(s)",
            items.len(),
            jobs.len()
        );

        let calls: Vec<_> = jobs
            .into_iter()
            .map(|(slot, chunk, request)| async move {
                (slot, self.caller.call(chunk, request).await)
            })
            .collect();

        let outcomes: Vec<(usize, TranslationOutcome)> = stream::iter(calls)
            .buffered(self.caller.concurrency())
            .collect()
            .await;

        let mut grouped: Vec<Vec<TranslationOutcome>> = vec![Vec::new(); items.len()];
        for (slot, outcome) in outcomes {
            grouped[slot].push(outcome);
        }

        let mut failed = 0;
        for (slot, group) in grouped.into_iter().enumerate() {
            if results[slot].is_some() {
                continue;
            }
            let request = items[slot].1;
            let result = reassemble(group, request.preserve_format, request.join_policy);
            if let Err(e) = &result {
                failed += 1;
                warn!("Batch item {} failed: {}", slot, e);
            }
            results[slot] = Some(result);
        }

        if failed > 0 {
            info!("Batch finished: {}/{} item(s) failed", failed, items.len());
        }

        results
            .into_iter()
            .map(|result| result.unwrap_or_else(|| Ok(String::new())))
            .collect()
    }

    /// Translate a UTF-8 file into `output`, creating parent directories.
    pub async fn translate_file(
        &self,
        input: &Path,
        output: &Path,
        request: &TranslationRequest,
    ) -> Result<()> {
        let text = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;

        let translated = self.translate(&text, request).await?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(output, translated)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;

        info!("Wrote translation of {} to {}", input.display(), output.display());
        Ok(())
    }
}

#[async_trait]
impl BatchTranslator for TranslationEngine {
    async fn translate_batch(
        &self,
        texts: &[String],
        request: &TranslationRequest,
    ) -> Result<BatchResults, TranslateError> {
        Ok(TranslationEngine::translate_batch(self, texts, request).await)
    }
}
