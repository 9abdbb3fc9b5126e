//! # Kiosk Voice - speech in, speech out, and who is standing at the desk
//!
//! Engines are abstracted behind [`TtsEngine`] and [`SttEngine`]; everything above them is
//! plain Tokio tasks talking through channels.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Voice layer                           │
//! │  ┌──────────────┐  speaking (watch)   ┌──────────────┐       │
//! │  │ SpeechOutput │────────────────────→│SpeechListener│       │
//! │  │ (FIFO queue) │                     │ (reconcile   │       │
//! │  └──────┬───────┘                     │  300ms tick) │       │
//! │         │ mark()                      └──────┬───────┘       │
//! │         ↓                                    │ results       │
//! │  ┌──────────────┐   admit(transcript)  ┌─────↓────────┐      │
//! │  │  SpokeClock  │←─────────────────────│SelfTrigger   │      │
//! │  └──────────────┘                      │Guard         │      │
//! │                                        └──────────────┘      │
//! │  ┌──────────────┐                                            │
//! │  │  Presence    │  samples → confirmed (one-shot)            │
//! │  │  Detector    │                                            │
//! │  └──────────────┘                                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod chunk;
pub mod engine;
pub mod error;
pub mod guard;
pub mod listener;
pub mod placeholder;
pub mod presence;
pub mod speech_output;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use engine::{
    select_voice, EngineUtterance, RecognitionEvent, RecognitionOptions, RecognitionStream,
    SttEngine, TtsEngine, VoiceInfo,
};
pub use error::{RecognitionError, VoiceError, VoiceResult};
pub use guard::{outside_buffer, SelfTriggerGuard, SpokeClock};
pub use listener::{ListenerEvent, ResultSource, SpeechListener};
pub use placeholder::{PlaceholderTts, ScriptedStt};
pub use presence::{wait_for_handoff, Handoff, PresenceDetector};
pub use speech_output::{Hook, SpeakOptions, SpeechOutput, UtteranceOutcome, UtteranceTicket};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
