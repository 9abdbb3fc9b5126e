//! Fallback chain: HTTP service (when configured) → keywords → not understood.

use crate::classifier::IntentClassifier;
use crate::error::IntentError;
use crate::http::HttpIntentClassifier;
use crate::keyword::KeywordClassifier;
use crate::result::IntentResult;
use async_trait::async_trait;
use kiosk_core::{IntentMode, IntentSettings};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Never fails: every error or low-confidence answer falls through to the next stage.
pub struct IntentRouter {
    remote: Option<Arc<dyn IntentClassifier>>,
    keywords: KeywordClassifier,
    min_confidence: f32,
}

impl IntentRouter {
    /// Keyword matching only.
    pub fn keywords(min_confidence: f32) -> Self {
        Self {
            remote: None,
            keywords: KeywordClassifier::new(),
            min_confidence,
        }
    }

    /// Ask `remote` first, keywords second.
    pub fn with_remote(remote: Arc<dyn IntentClassifier>, min_confidence: f32) -> Self {
        Self {
            remote: Some(remote),
            ..Self::keywords(min_confidence)
        }
    }

    /// Build from configuration. A remote mode without a usable URL degrades to keywords.
    /// `language` is forwarded to the HTTP service.
    pub fn from_settings(settings: &IntentSettings, language: &str) -> Self {
        match settings.mode {
            IntentMode::Keyword => {
                info!("IntentRouter: keyword classification");
                Self::keywords(settings.min_confidence)
            }
            IntentMode::Remote => match HttpIntentClassifier::from_settings(settings, language) {
                Ok(http) => {
                    info!(url = %http.url(), "IntentRouter: HTTP classification with keyword fallback");
                    Self::with_remote(Arc::new(http), settings.min_confidence)
                }
                Err(e) => {
                    warn!(error = %e, "IntentRouter: remote mode unavailable, using keywords");
                    Self::keywords(settings.min_confidence)
                }
            },
        }
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub async fn route(&self, text: &str) -> IntentResult {
        if let Some(remote) = &self.remote {
            match remote.classify(text).await {
                Ok(result) if result.is_usable(self.min_confidence) => return result,
                Ok(result) => debug!(
                    classifier = remote.name(),
                    ?result,
                    "result below confidence threshold; trying keywords"
                ),
                Err(e) => warn!(classifier = remote.name(), error = %e, "classification failed; trying keywords"),
            }
        }

        let result = self.keywords.classify_text(text);
        if result.is_usable(self.min_confidence) {
            return result;
        }
        debug!(text, "not understood");
        IntentResult::not_understood()
    }
}

#[async_trait]
impl IntentClassifier for IntentRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn classify(&self, text: &str) -> Result<IntentResult, IntentError> {
        Ok(self.route(text).await)
    }
}
