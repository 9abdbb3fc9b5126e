//! HTTP intent service client.
//!
//! Posts `{"text": ..., "language": ...}` as JSON and reads `{intent, grade, confidence}`
//! back, parsed leniently.

use crate::classifier::IntentClassifier;
use crate::error::IntentError;
use crate::result::IntentResult;
use async_trait::async_trait;
use kiosk_core::IntentSettings;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    language: &'a str,
}

pub struct HttpIntentClassifier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    language: String,
}

impl HttpIntentClassifier {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IntentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            language: "tr".to_string(),
        })
    }

    /// Send `tag`'s primary subtag (`tr-TR` → `tr`) as the request language.
    pub fn with_language(mut self, tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default().trim();
        if !primary.is_empty() {
            self.language = primary.to_ascii_lowercase();
        }
        self
    }

    /// `language` is the kiosk's speech language tag.
    pub fn from_settings(settings: &IntentSettings, language: &str) -> Result<Self, IntentError> {
        let url = settings
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(IntentError::NotConfigured("intent.api_url is empty"))?;
        Ok(Self::new(url, settings.resolve_api_key(), settings.timeout())?.with_language(language))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IntentClassifier for HttpIntentClassifier {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, text: &str) -> Result<IntentResult, IntentError> {
        let body = ClassifyRequest {
            text,
            language: &self.language,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IntentError::Http(format!("status {status}")));
        }
        let raw = response.text().await?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let result = IntentResult::from_value(&value)?;
        debug!(url = %self.url, ?result, "intent service answered");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_comes_from_the_speech_tag() {
        let settings = IntentSettings {
            api_url: Some("http://127.0.0.1:9/classify".into()),
            ..IntentSettings::default()
        };
        let http = HttpIntentClassifier::from_settings(&settings, "en-US").unwrap();
        assert_eq!(http.language(), "en");
        let http = HttpIntentClassifier::from_settings(&settings, "tr_TR").unwrap();
        assert_eq!(http.language(), "tr");
        let http = http.with_language("  ");
        assert_eq!(http.language(), "tr");
    }

    #[test]
    fn empty_url_is_not_configured() {
        let settings = IntentSettings {
            api_url: Some("   ".into()),
            ..IntentSettings::default()
        };
        assert!(matches!(
            HttpIntentClassifier::from_settings(&settings, "tr-TR"),
            Err(IntentError::NotConfigured(_))
        ));
    }
}
