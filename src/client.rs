//! HTTP client for a remote translation server.
//!
//! Lets the page controller run against a server started with `envi serve`
//! instead of an in-process engine. The endpoint is read from the settings
//! store on every dispatch, so a changed endpoint is picked up by the next
//! batch.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::engine::{BatchResults, BatchTranslator};
use crate::error::{ProviderError, TranslateError};
use crate::request::TranslationRequest;
use crate::server::{BatchItem, BatchTranslateRequest, BatchTranslateResponse, TranslateOptions};
use crate::settings::{Settings, SettingsStore};

/// [`BatchTranslator`] backed by a remote `/translate_batch` endpoint.
#[derive(Clone)]
pub struct RemoteTranslator {
    client: reqwest::Client,
    settings: Arc<dyn SettingsStore>,
}

impl RemoteTranslator {
    pub fn new(settings: Arc<dyn SettingsStore>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    async fn endpoint(&self) -> String {
        Settings::load(self.settings.as_ref()).await.endpoint
    }

    /// Name → code listing published by the server.
    pub async fn fetch_languages(&self) -> Result<Vec<(String, String)>, ProviderError> {
        let url = format!("{}/languages", self.endpoint().await);

        let response = self
            .client
            .get(&url)
            .query(&[("as_dict", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), body));
        }

        let listing: BTreeMap<String, String> = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to parse languages: {}", e)))?;

        Ok(listing.into_iter().collect())
    }
}

#[async_trait]
impl BatchTranslator for RemoteTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        request: &TranslationRequest,
    ) -> Result<BatchResults, TranslateError> {
        let url = format!("{}/translate_batch", self.endpoint().await);
        let body = BatchTranslateRequest {
            items: texts
                .iter()
                .map(|text| BatchItem {
                    text: text.clone(),
                    source: Some(request.source_lang.clone()),
                    target: Some(request.target_lang.clone()),
                })
                .collect(),
            options: TranslateOptions::from_request(request),
        };

        debug!("Dispatching {} text(s) to {}", texts.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::from_provider(e.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!("Batch endpoint returned {}: {}", status, detail);
            return Err(TranslateError::from_provider(ProviderError::http(
                status.as_u16(),
                detail,
            )));
        }

        let reply: BatchTranslateResponse = response.json().await.map_err(|e| {
            TranslateError::from_provider(ProviderError::transport(format!(
                "Failed to parse batch response: {}",
                e
            )))
        })?;

        if reply.results.len() != texts.len() {
            return Err(TranslateError::from_provider(ProviderError::transport(format!(
                "Batch response has {} result(s) for {} text(s)",
                reply.results.len(),
                texts.len()
            ))));
        }

        Ok(reply
            .results
            .into_iter()
            .map(|item| match (item.translated, item.error) {
                (Some(text), None) => Ok(text),
                (_, error) => Err(TranslateError::PermanentFailure(ProviderError::http(
                    502,
                    error.unwrap_or_else(|| "missing translation".to_string()),
                ))),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemorySettings, KEY_ENDPOINT};
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn translator_for(endpoint: &str) -> RemoteTranslator {
        let settings = Arc::new(MemorySettings::new().with(KEY_ENDPOINT, endpoint));
        RemoteTranslator::new(settings, Duration::from_secs(5)).unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_translate_batch_maps_per_item_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_batch"))
            .and(body_partial_json(json!({
                "items": [
                    {"text": "one", "source": "auto", "target": "vi"},
                    {"text": "two", "source": "auto", "target": "vi"}
                ],
                "max_chars": 4500
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"translated": "một"},
                    {"error": "permanent provider failure"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = translator_for(&server.uri())
            .translate_batch(&texts(&["one", "two"]), &TranslationRequest::default())
            .await
            .unwrap();

        assert_eq!(results[0].as_deref(), Ok("một"));
        assert!(matches!(results[1], Err(TranslateError::PermanentFailure(_))));
    }

    #[tokio::test]
    async fn test_server_error_fails_whole_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = translator_for(&server.uri())
            .translate_batch(&texts(&["one"]), &TranslationRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.provider_cause().and_then(|c| c.status), Some(503));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_whole_dispatch() {
        // Nothing listens on port 9 (discard) in the test environment.
        let err = translator_for("http://127.0.0.1:9")
            .translate_batch(&texts(&["one"]), &TranslationRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::TransientProvider(_)));
    }

    #[tokio::test]
    async fn test_result_count_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        assert!(translator_for(&server.uri())
            .translate_batch(&texts(&["one"]), &TranslationRequest::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_endpoint_is_reread_per_dispatch() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        for server in [&first, &second] {
            Mock::given(method("POST"))
                .and(path("/translate_batch"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"results": [{"translated": "ok"}]})),
                )
                .expect(1)
                .mount(server)
                .await;
        }

        let settings = Arc::new(MemorySettings::new().with(KEY_ENDPOINT, first.uri()));
        let translator = RemoteTranslator::new(settings.clone(), Duration::from_secs(5)).unwrap();
        let request = TranslationRequest::default();

        translator.translate_batch(&texts(&["a"]), &request).await.unwrap();
        settings.set(KEY_ENDPOINT, second.uri());
        translator.translate_batch(&texts(&["a"]), &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_languages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/languages"))
            .and(query_param("as_dict", "true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"English": "en", "Vietnamese": "vi"})),
            )
            .mount(&server)
            .await;

        let languages = translator_for(&server.uri()).fetch_languages().await.unwrap();
        assert_eq!(
            languages,
            vec![
                ("English".to_string(), "en".to_string()),
                ("Vietnamese".to_string(), "vi".to_string())
            ]
        );
    }
}
