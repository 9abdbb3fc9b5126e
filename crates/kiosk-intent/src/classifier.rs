use crate::error::IntentError;
use crate::result::IntentResult;
use async_trait::async_trait;

/// Turns a transcript into an [`IntentResult`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn classify(&self, text: &str) -> Result<IntentResult, IntentError>;
}
