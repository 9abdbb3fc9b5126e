//! Error types for intent classification

use thiserror::Error;

/// Errors from an intent classifier. The router turns every one of them into a fallback.
#[derive(Error, Debug)]
pub enum IntentError {
    #[error("Intent service request failed: {0}")]
    Http(String),

    #[error("Intent service timed out")]
    Timeout,

    #[error("Malformed intent payload: {0}")]
    Malformed(String),

    #[error("Intent service not configured: {0}")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for IntentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IntentError::Timeout
        } else if e.is_decode() {
            IntentError::Malformed(e.to_string())
        } else {
            IntentError::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for IntentError {
    fn from(e: serde_json::Error) -> Self {
        IntentError::Malformed(e.to_string())
    }
}
