//! Speech engine seams. The kiosk never talks to audio hardware directly: synthesis and
//! recognition are provided by implementations of these traits (browser bridge, cloud API,
//! or the placeholder/scripted engines in [`crate::placeholder`]).

use crate::error::{RecognitionError, VoiceResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A synthesis voice offered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP-47 language tag (e.g. "tr-TR").
    pub lang: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// One chunk handed to the synthesis engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineUtterance {
    pub text: String,
    pub language: String,
    /// Selected voice name, if the engine offered any.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Backend that plays text as speech.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Voices available for selection. Empty means "engine default".
    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    /// Speak one chunk; resolves when playback has ended or failed.
    async fn speak(&self, utterance: &EngineUtterance) -> VoiceResult<()>;

    /// Halt current playback. An in-flight `speak` should resolve soon after.
    fn cancel(&self);
}

/// Pick the first voice whose tag shares the primary language subtag, else the first voice.
pub fn select_voice(voices: &[VoiceInfo], language: &str) -> Option<VoiceInfo> {
    let primary = primary_subtag(language);
    voices
        .iter()
        .find(|v| primary_subtag(&v.lang) == primary)
        .or_else(|| voices.first())
        .cloned()
}

fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Options for a continuous recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

/// Events produced by a running recognition session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Interim(String),
    Final(String),
    Error(RecognitionError),
    /// The engine closed the session on its own.
    Ended,
}

/// Receiving side of a recognition session. Dropping it is equivalent to the session ending.
pub type RecognitionStream = mpsc::UnboundedReceiver<RecognitionEvent>;

/// Backend that turns microphone audio into transcripts.
pub trait SttEngine: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    /// Start a session. At most one session is active per engine.
    fn start(&self, options: &RecognitionOptions) -> Result<RecognitionStream, RecognitionError>;

    /// Abort the active session immediately, discarding in-flight recognition.
    fn abort(&self);
}
