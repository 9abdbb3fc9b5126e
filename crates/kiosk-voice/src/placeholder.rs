//! Engines that need no audio hardware.
//!
//! `PlaceholderTts` logs what would be spoken and simulates its duration. `ScriptedStt`
//! exposes the active session to code (tests, a console) that pushes recognition events
//! by hand.

use crate::engine::{
    EngineUtterance, RecognitionEvent, RecognitionOptions, RecognitionStream, SttEngine,
    TtsEngine, VoiceInfo,
};
use crate::error::{RecognitionError, VoiceError, VoiceResult};
use crate::lock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};

/// Placeholder TTS: nothing is played, each chunk takes `per_char × characters / rate`.
#[derive(Debug)]
pub struct PlaceholderTts {
    per_char: Duration,
    voices: Vec<VoiceInfo>,
    fail_on: Option<String>,
    spoken: Mutex<Vec<EngineUtterance>>,
    cancel: Notify,
}

impl Default for PlaceholderTts {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl PlaceholderTts {
    pub fn new(per_char: Duration) -> Self {
        Self {
            per_char,
            voices: vec![VoiceInfo::new("Placeholder", "tr-TR")],
            fail_on: None,
            spoken: Mutex::new(Vec::new()),
            cancel: Notify::new(),
        }
    }

    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }

    /// Make `speak` fail for chunks containing `needle` (engine error simulation).
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Every chunk handed to the engine so far, in order.
    pub fn spoken(&self) -> Vec<EngineUtterance> {
        lock(&self.spoken).clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        lock(&self.spoken).iter().map(|u| u.text.clone()).collect()
    }

    fn duration_for(&self, utterance: &EngineUtterance) -> Duration {
        let chars = utterance.text.chars().count() as f32;
        let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
        self.per_char.mul_f32(chars / rate)
    }
}

#[async_trait]
impl TtsEngine for PlaceholderTts {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &EngineUtterance) -> VoiceResult<()> {
        lock(&self.spoken).push(utterance.clone());
        if let Some(needle) = &self.fail_on {
            if utterance.text.contains(needle.as_str()) {
                return Err(VoiceError::Tts(format!("synthesis failed for {needle:?}")));
            }
        }
        info!(voice = ?utterance.voice, "🔊 {}", utterance.text);
        let cancelled = self.cancel.notified();
        tokio::select! {
            _ = tokio::time::sleep(self.duration_for(utterance)) => {}
            _ = cancelled => debug!("placeholder playback cancelled"),
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}

/// Recognition engine driven by hand: `push_final` delivers a transcript to the active session.
#[derive(Debug)]
pub struct ScriptedStt {
    supported: bool,
    start_error: Mutex<Option<RecognitionError>>,
    session: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    starts: AtomicUsize,
    aborts: AtomicUsize,
}

impl Default for ScriptedStt {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStt {
    pub fn new() -> Self {
        Self {
            supported: true,
            start_error: Mutex::new(None),
            session: Mutex::new(None),
            starts: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        }
    }

    /// An engine that reports itself unsupported (no recognition API on the device).
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Make the next `start` calls fail with `error` until cleared with `None`.
    pub fn fail_starts_with(&self, error: Option<RecognitionError>) {
        *lock(&self.start_error) = error;
    }

    pub fn is_active(&self) -> bool {
        lock(&self.session).as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    /// Deliver a final transcript. Returns false when no session is listening.
    pub fn push_final(&self, text: impl Into<String>) -> bool {
        self.push(RecognitionEvent::Final(text.into()))
    }

    pub fn push_interim(&self, text: impl Into<String>) -> bool {
        self.push(RecognitionEvent::Interim(text.into()))
    }

    pub fn push_error(&self, error: RecognitionError) -> bool {
        let delivered = self.push(RecognitionEvent::Error(error));
        lock(&self.session).take();
        delivered
    }

    /// End the session from the engine side.
    pub fn end_session(&self) -> bool {
        let delivered = self.push(RecognitionEvent::Ended);
        lock(&self.session).take();
        delivered
    }

    fn push(&self, event: RecognitionEvent) -> bool {
        match lock(&self.session).as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl SttEngine for ScriptedStt {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&self, options: &RecognitionOptions) -> Result<RecognitionStream, RecognitionError> {
        if !self.supported {
            return Err(RecognitionError::Unsupported);
        }
        if let Some(err) = lock(&self.start_error).clone() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.session) = Some(tx);
        self.starts.fetch_add(1, Ordering::SeqCst);
        debug!(language = %options.language, "scripted recognition session started");
        Ok(rx)
    }

    fn abort(&self) {
        if lock(&self.session).take().is_some() {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }
}
