//! HTTP serving layer over the translation engine.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::catalog::LanguageCatalog;
use crate::engine::TranslationEngine;
use crate::error::TranslateError;
use crate::request::TranslationRequest;

const MAX_CHARS_RANGE: std::ops::RangeInclusive<usize> = 100..=5000;
const RETRIES_RANGE: std::ops::RangeInclusive<u32> = 0..=10;
const BACKOFF_RANGE: std::ops::RangeInclusive<f64> = 0.0..=10.0;

/// Shared state of the HTTP handlers.
pub struct AppState {
    pub engine: TranslationEngine,
    pub catalog: LanguageCatalog,
    /// Defaults for every parameter a client leaves out
    pub defaults: TranslationRequest,
}

/// Tuning parameters a client may override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_format: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_sec: Option<f64>,
}

impl TranslateOptions {
    /// The options a request would be sent with.
    pub fn from_request(request: &TranslationRequest) -> Self {
        Self {
            preserve_format: Some(request.preserve_format),
            max_chars: Some(request.max_chars),
            retries: Some(request.retries),
            retry_backoff_sec: Some(request.backoff_base_seconds),
        }
    }

    /// Overlay these options on `base`, rejecting out-of-range values.
    fn apply(&self, base: &TranslationRequest) -> Result<TranslationRequest, ApiError> {
        let mut request = base.clone();
        if let Some(preserve_format) = self.preserve_format {
            request.preserve_format = preserve_format;
        }
        if let Some(max_chars) = self.max_chars {
            if !MAX_CHARS_RANGE.contains(&max_chars) {
                return Err(ApiError::unprocessable(format!(
                    "max_chars must be between {} and {}",
                    MAX_CHARS_RANGE.start(),
                    MAX_CHARS_RANGE.end()
                )));
            }
            request.max_chars = max_chars;
        }
        if let Some(retries) = self.retries {
            if !RETRIES_RANGE.contains(&retries) {
                return Err(ApiError::unprocessable(format!(
                    "retries must be between {} and {}",
                    RETRIES_RANGE.start(),
                    RETRIES_RANGE.end()
                )));
            }
            request.retries = retries;
        }
        if let Some(backoff) = self.retry_backoff_sec {
            if !BACKOFF_RANGE.contains(&backoff) {
                return Err(ApiError::unprocessable(format!(
                    "retry_backoff_sec must be between {} and {}",
                    BACKOFF_RANGE.start(),
                    BACKOFF_RANGE.end()
                )));
            }
            request.backoff_base_seconds = backoff;
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateBody {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub options: TranslateOptions,
}

/// Query-string form of [`TranslateBody`].
#[derive(Debug, Deserialize)]
pub struct TranslateQuery {
    pub text: String,
    pub source: Option<String>,
    pub target: Option<String>,
    pub preserve_format: Option<bool>,
    pub max_chars: Option<usize>,
    pub retries: Option<u32>,
    pub retry_backoff_sec: Option<f64>,
}

impl From<TranslateQuery> for TranslateBody {
    fn from(query: TranslateQuery) -> Self {
        Self {
            text: query.text,
            source: query.source,
            target: query.target,
            options: TranslateOptions {
                preserve_format: query.preserve_format,
                max_chars: query.max_chars,
                retries: query.retries,
                retry_backoff_sec: query.retry_backoff_sec,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTranslateRequest {
    pub items: Vec<BatchItem>,
    #[serde(flatten)]
    pub options: TranslateOptions,
}

/// Outcome of one batch item; exactly one field is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<String, TranslateError>> for BatchItemResult {
    fn from(result: Result<String, TranslateError>) -> Self {
        match result {
            Ok(text) => Self {
                translated: Some(text),
                error: None,
            },
            Err(e) => Self {
                translated: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTranslateResponse {
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Deserialize)]
pub struct LanguagesQuery {
    #[serde(default = "default_as_dict")]
    pub as_dict: bool,
}

fn default_as_dict() -> bool {
    true
}

/// Handler failure rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unprocessable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }
}

impl From<TranslateError> for ApiError {
    fn from(error: TranslateError) -> Self {
        let status = match error {
            TranslateError::TranslationFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/translate", get(translate_get).post(translate_post))
        .route("/translate_batch", post(translate_batch))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "Serving translations on http://{} (provider: {})",
        addr,
        state.engine.provider_name()
    );

    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "ENVI Translator",
        "version": env!("CARGO_PKG_VERSION"),
        "translate": "POST /translate",
        "translate_batch": "POST /translate_batch",
        "languages": "GET /languages",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn languages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LanguagesQuery>,
) -> Json<serde_json::Value> {
    if query.as_dict {
        Json(serde_json::json!(state.catalog.as_map()))
    } else {
        Json(serde_json::json!(state.catalog.names()))
    }
}

async fn translate_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranslateQuery>,
) -> Result<Json<TranslateResponse>, ApiError> {
    translate_one(&state, query.into()).await
}

async fn translate_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TranslateBody>,
) -> Result<Json<TranslateResponse>, ApiError> {
    translate_one(&state, body).await
}

async fn translate_one(
    state: &AppState,
    body: TranslateBody,
) -> Result<Json<TranslateResponse>, ApiError> {
    let request = item_request(state, &body.options, body.source.as_deref(), body.target.as_deref())?;

    let translated = state.engine.translate(&body.text, &request).await.map_err(|e| {
        warn!("Translate request failed: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(TranslateResponse {
        translated,
        source: request.source_lang,
        target: request.target_lang,
    }))
}

async fn translate_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchTranslateRequest>,
) -> Result<Json<BatchTranslateResponse>, ApiError> {
    let requests = body
        .items
        .iter()
        .map(|item| {
            item_request(
                &state,
                &body.options,
                item.source.as_deref(),
                item.target.as_deref(),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let items: Vec<(&str, &TranslationRequest)> = body
        .items
        .iter()
        .zip(&requests)
        .map(|(item, request)| (item.text.as_str(), request))
        .collect();

    let results = state.engine.translate_items(&items).await;

    Ok(Json(BatchTranslateResponse {
        results: results.into_iter().map(BatchItemResult::from).collect(),
    }))
}

/// Effective request for one text: defaults, then options, then languages.
fn item_request(
    state: &AppState,
    options: &TranslateOptions,
    source: Option<&str>,
    target: Option<&str>,
) -> Result<TranslationRequest, ApiError> {
    let mut request = options.apply(&state.defaults)?;
    if let Some(source) = source {
        request.source_lang = state.catalog.resolve(source);
    }
    if let Some(target) = target {
        request.target_lang = state.catalog.resolve(target);
    }
    Ok(request)
}
