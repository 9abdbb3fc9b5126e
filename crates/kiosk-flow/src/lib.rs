//! kiosk-flow: the front desk screen state machine.
//!
//! ```text
//!  camera ──samples──→ ┌───────────────┐ ──prompts──→ SpeechOutput
//!  buttons ─commands─→ │ DeskController│ ──listen───→ SpeechListener
//!  listener ─results─→ └───────────────┘ ──screen────→ watch<Screen>
//!                          │        ↑
//!                   classify│        │Classified / Settled / Countdown (epoch-tagged)
//!                          ↓        │
//!                     IntentClassifier
//! ```

pub mod controller;
pub mod countdown;

pub use controller::{DeskCommand, DeskController, DeskHandle, DeskParts};
pub use countdown::ScreenCountdown;
