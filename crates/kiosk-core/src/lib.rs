//! kiosk-core: shared types for the front desk kiosk (configuration, signal bus, screen
//! model, staff directory). The voice, intent and flow crates and the daemon build on it.

mod bus;
mod config;
mod directory;
mod screen;

pub use bus::{CameraStatus, PresenceSample, SignalBus, Topic};
pub use config::{
    fill_prompt, GuardSettings, IntentMode, IntentSettings, KioskConfig, ListenerSettings,
    PresenceSettings, Prompts, ScreenSettings, SpeechSettings,
};
pub use directory::{fold, StaffDirectory, StaffMember};
pub use screen::{Grade, Screen, ScreenKind, TransitionCause, TransitionRecord};
