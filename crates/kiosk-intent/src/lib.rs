//! kiosk-intent: what did the visitor ask for?
//!
//! [`IntentRouter`] is what the controller talks to. It asks the HTTP service when one is
//! configured, falls back to [`KeywordClassifier`], and finally answers "not understood".

mod classifier;
mod error;
mod http;
mod keyword;
mod result;
mod router;

pub use classifier::IntentClassifier;
pub use error::IntentError;
pub use http::HttpIntentClassifier;
pub use keyword::{affirmation, grade_from_text, KeywordClassifier};
pub use result::{IntentResult, MenuIntent};
pub use router::IntentRouter;
