//! Google Translate web endpoint provider
//!
//! Talks to the keyless `translate_a/single?client=gtx` endpoint used by the
//! browser widget. The reply is a nested JSON array whose first element lists
//! the translated sentence segments:
//!
//! ```text
//! [[["Xin chào. ","Hello. ",null,null,10],["Bạn khỏe không?","How are you?",...]],null,"en",...]
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::TranslationProvider;
use crate::error::ProviderError;

pub const DEFAULT_GOOGLE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Provider backed by Google's public web translation endpoint
#[derive(Debug, Clone)]
pub struct GoogleWebProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleWebProvider {
    /// Create a provider for `base_url` whose calls time out after `timeout`.
    ///
    /// A timeout surfaces as a transport failure, which the retry loop treats
    /// as transient.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parse_reply(body: &serde_json::Value) -> Result<String, ProviderError> {
        let Some(segments) = body.get(0) else {
            return Err(ProviderError::transport(
                "Invalid response: expected a JSON array",
            ));
        };

        // Whitespace-only input comes back with a null segment list.
        if segments.is_null() {
            return Ok(String::new());
        }

        let segments = segments.as_array().ok_or_else(|| {
            ProviderError::transport("Invalid response: segment list is not an array")
        })?;

        Ok(segments
            .iter()
            .filter_map(|segment| segment.get(0).and_then(|s| s.as_str()))
            .collect())
    }
}

/// Language codes are letters, digits, `-` and `_`; anything else is a client error.
fn validate_lang(lang: &str) -> Result<(), ProviderError> {
    if lang.is_empty() {
        return Err(ProviderError::invalid_request("Language code is empty"));
    }
    if !lang
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProviderError::invalid_request(format!(
            "Invalid characters in language code: {}",
            lang
        )));
    }
    Ok(())
}

#[async_trait]
impl TranslationProvider for GoogleWebProvider {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, ProviderError> {
        validate_lang(source)?;
        validate_lang(target)?;

        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        debug!(
            "Google: translating {} chars {} -> {}",
            text.chars().count(),
            source,
            target
        );

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("client", "gtx"), ("sl", source), ("tl", target), ("dt", "t")])
            .form(&[("q", text)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::http(status.as_u16(), body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to parse response: {}", e)))?;

        Self::parse_reply(&body)
    }

    fn provider_name(&self) -> &str {
        "Google Translate (web)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_string_contains, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    async fn provider_for(server: &MockServer) -> GoogleWebProvider {
        GoogleWebProvider::new(
            format!("{}/translate_a/single", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_reply_concatenates_segments() {
        let body = json!([
            [["Xin chào. ", "Hello. ", null, null, 10], ["Bạn khỏe không?", "How are you?", null, null, 10]],
            null,
            "en"
        ]);
        assert_eq!(
            GoogleWebProvider::parse_reply(&body).unwrap(),
            "Xin chào. Bạn khỏe không?"
        );
    }

    #[test]
    fn test_parse_reply_null_segments() {
        let body = json!([null, null, "en"]);
        assert_eq!(GoogleWebProvider::parse_reply(&body).unwrap(), "");
    }

    #[test]
    fn test_parse_reply_rejects_non_array() {
        let err = GoogleWebProvider::parse_reply(&json!({"error": "nope"})).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_validate_lang() {
        assert!(validate_lang("auto").is_ok());
        assert!(validate_lang("zh-CN").is_ok());
        assert!(validate_lang("").is_err());
        let err = validate_lang("en@US").unwrap_err();
        assert_eq!(err.status, Some(400));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_translate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_a/single"))
            .and(query_param("client", "gtx"))
            .and(query_param("sl", "en"))
            .and(query_param("tl", "vi"))
            .and(body_string_contains("q=Hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                [["Xin chào", "Hello", null, null, 10]],
                null,
                "en"
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider.translate("Hello", "en", "vi").await.unwrap();
        assert_eq!(result, "Xin chào");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.translate("Hello", "auto", "vi").await.unwrap_err();
        assert_eq!(err.status, Some(429));
        assert!(err.is_transient());
        assert!(err.message.contains("Too Many Requests"));
    }

    #[tokio::test]
    async fn test_bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad target"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.translate("Hello", "en", "xx").await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_language_never_reaches_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.translate("Hello", "en", "v i").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([[["late", "late"]]]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let provider = GoogleWebProvider::new(
            format!("{}/translate_a/single", server.uri()),
            Duration::from_millis(50),
        )
        .unwrap();
        let err = provider.translate("Hello", "en", "vi").await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_blank_text_short_circuits() {
        let server = MockServer::start().await;
        let provider = provider_for(&server).await;
        assert_eq!(provider.translate("  \n", "en", "vi").await.unwrap(), "  \n");
    }
}
