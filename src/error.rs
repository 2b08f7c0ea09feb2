//! Error types shared by the provider, the engine and the page controller.

use thiserror::Error;

/// Failure reported by a translation provider for a single call.
///
/// `status` is the HTTP status when the backend answered, `None` when the
/// request never completed (connection refused, timeout, broken body).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.status, .message))]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// A failure below HTTP: connect errors, timeouts, truncated bodies.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A non-2xx answer from the backend.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A request the backend can never accept (bad language code, malformed input).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::http(400, message)
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Transport failures, 408, 429 and 5xx are transient; every other status
    /// (400, 401, 403, 404, ...) is permanent.
    pub fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status == 408 || status == 429 || status >= 500,
        }
    }
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("provider returned {}: {}", status, message),
        None => format!("provider unreachable: {}", message),
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::http(status.as_u16(), error.to_string()),
            None => Self::transport(error.to_string()),
        }
    }
}

/// Failure of one chunk inside a text, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub error: TranslateError,
}

/// Terminal error of a translation operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The input or the chunking parameters could not be segmented.
    #[error("segmentation error: {0}")]
    Segmentation(String),

    /// A retryable provider failure surfaced without going through the retry loop
    /// (e.g. the whole batch dispatch to a remote endpoint failed).
    #[error("transient provider error: {0}")]
    TransientProvider(ProviderError),

    /// The provider rejected the request; retrying cannot help.
    #[error("permanent provider failure: {0}")]
    PermanentFailure(ProviderError),

    /// A transient failure survived every allowed attempt.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: ProviderError },

    /// At least one chunk of a single text could not be translated.
    #[error("translation failed for {} chunk(s): {}", .failures.len(), format_failures(.failures))]
    TranslationFailed { failures: Vec<ChunkFailure> },
}

impl TranslateError {
    /// Classify a raw provider failure without retrying it.
    pub fn from_provider(error: ProviderError) -> Self {
        if error.is_transient() {
            TranslateError::TransientProvider(error)
        } else {
            TranslateError::PermanentFailure(error)
        }
    }

    /// The underlying provider failure, if this error carries one.
    pub fn provider_cause(&self) -> Option<&ProviderError> {
        match self {
            TranslateError::TransientProvider(cause)
            | TranslateError::PermanentFailure(cause)
            | TranslateError::RetryExhausted { last: cause, .. } => Some(cause),
            TranslateError::Segmentation(_) | TranslateError::TranslationFailed { .. } => None,
        }
    }

    /// Indices of the chunks that failed, for the aggregate error.
    pub fn failed_indices(&self) -> Vec<usize> {
        match self {
            TranslateError::TranslationFailed { failures } => {
                failures.iter().map(|f| f.index).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[ChunkFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("chunk {}: {}", f.index, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
