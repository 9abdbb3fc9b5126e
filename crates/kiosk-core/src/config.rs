//! Kiosk configuration.
//!
//! Precedence: env `KIOSK_CONFIG` path > `config/kiosk.toml` > defaults, then `KIOSK__*`
//! environment overrides (e.g. `KIOSK__SPEECH__RATE=1.1`, `KIOSK__SCREENS__COUNTDOWN_SECS=45`).
//! Every section has serde defaults so a partial file is enough.

use crate::directory::StaffDirectory;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "KIOSK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/kiosk.toml";
const ENV_INTENT_API_KEY: &str = "KIOSK_INTENT_API_KEY";

/// Top-level configuration for the front desk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Display name used in logs (e.g. "Atatürk Anadolu Lisesi Danışma").
    pub app_name: String,
    pub speech: SpeechSettings,
    pub listener: ListenerSettings,
    pub guard: GuardSettings,
    pub presence: PresenceSettings,
    pub screens: ScreenSettings,
    pub intent: IntentSettings,
    pub prompts: Prompts,
    pub staff: StaffDirectory,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            app_name: "Okul Danışma".to_string(),
            speech: SpeechSettings::default(),
            listener: ListenerSettings::default(),
            guard: GuardSettings::default(),
            presence: PresenceSettings::default(),
            screens: ScreenSettings::default(),
            intent: IntentSettings::default(),
            prompts: Prompts::default(),
            staff: StaffDirectory::default(),
        }
    }
}

impl KioskConfig {
    /// Load config from file and environment, then validate it.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same as [`KioskConfig::load`] with an explicit file path. A missing file is skipped.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            tracing::debug!(path = %path.display(), "loading kiosk config file");
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("KIOSK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the coordinator cannot work with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let fail = |msg: &str| Err(config::ConfigError::Message(msg.to_string()));
        if self.speech.chunk_max_chars == 0 {
            return fail("speech.chunk_max_chars must be greater than zero");
        }
        if self.speech.chunk_threshold < self.speech.chunk_max_chars {
            return fail("speech.chunk_threshold must be at least speech.chunk_max_chars");
        }
        if self.listener.reconcile_interval_ms == 0 {
            return fail("listener.reconcile_interval_ms must be greater than zero");
        }
        if self.presence.confirm_threshold == 0 {
            return fail("presence.confirm_threshold must be at least 1");
        }
        if self.screens.countdown_secs == 0 {
            return fail("screens.countdown_secs must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.intent.min_confidence) {
            return fail("intent.min_confidence must be within 0.0..=1.0");
        }
        Ok(())
    }

    /// Render the effective configuration as TOML (for `--print-config` style dumps).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// BCP-47 tag; voices whose tag starts with the primary subtag are preferred.
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Text longer than this (in characters) is chunked.
    pub chunk_threshold: usize,
    /// Target chunk length in characters.
    pub chunk_max_chars: usize,
    /// Pause between chunks of one utterance.
    pub chunk_pause_ms: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            language: "tr-TR".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            chunk_threshold: 150,
            chunk_max_chars: 100,
            chunk_pause_ms: 250,
        }
    }
}

impl SpeechSettings {
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }
}

/// Speech recognition session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    pub language: String,
    /// Interval of the output/input reconciliation tick.
    pub reconcile_interval_ms: u64,
    /// Restarts allowed after transient errors before the long cooldown.
    pub max_retries: u32,
    /// Base restart delay; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    /// Wait after exhausting `max_retries`.
    pub retry_cooldown_ms: u64,
    /// Delay between a final result and stopping the session.
    pub result_grace_ms: u64,
    /// Minimum time since the last utterance ended before a session may start.
    pub quiet_buffer_ms: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            language: "tr-TR".to_string(),
            reconcile_interval_ms: 300,
            max_retries: 3,
            retry_backoff_ms: 500,
            retry_cooldown_ms: 5000,
            result_grace_ms: 400,
            quiet_buffer_ms: 900,
        }
    }
}

impl ListenerSettings {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    pub fn result_grace(&self) -> Duration {
        Duration::from_millis(self.result_grace_ms)
    }

    pub fn quiet_buffer(&self) -> Duration {
        Duration::from_millis(self.quiet_buffer_ms)
    }
}

/// Self-trigger guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    pub buffer_ms: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self { buffer_ms: 900 }
    }
}

impl GuardSettings {
    pub fn buffer(&self) -> Duration {
        Duration::from_millis(self.buffer_ms)
    }
}

/// Face presence confirmation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Consecutive qualifying samples needed to confirm presence.
    pub confirm_threshold: u32,
    /// Longest wait for a playing announcement before moving on anyway.
    pub handoff_fallback_ms: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            confirm_threshold: 1,
            handoff_fallback_ms: 2000,
        }
    }
}

impl PresenceSettings {
    pub fn handoff_fallback(&self) -> Duration {
        Duration::from_millis(self.handoff_fallback_ms)
    }
}

/// Screen controller timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSettings {
    pub settle_delay_ms: u64,
    pub transition_cooldown_ms: u64,
    /// Countdown on terminal screens before timing out.
    pub countdown_secs: u64,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            transition_cooldown_ms: 1500,
            countdown_secs: 30,
        }
    }
}

impl ScreenSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn transition_cooldown(&self) -> Duration {
        Duration::from_millis(self.transition_cooldown_ms)
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }
}

/// Which classifier backs intent resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentMode {
    /// Local keyword matching only.
    #[default]
    Keyword,
    /// HTTP classification service with keyword fallback.
    Remote,
}

/// Intent classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    pub mode: IntentMode,
    /// Endpoint accepting `{"text": ...}` and answering `{intent, grade, confidence}`.
    pub api_url: Option<String>,
    /// Bearer token; falls back to `KIOSK_INTENT_API_KEY`.
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    /// Results below this confidence are treated as not understood.
    pub min_confidence: f32,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self {
            mode: IntentMode::Keyword,
            api_url: None,
            api_key: None,
            timeout_ms: 4000,
            min_confidence: 0.4,
        }
    }
}

impl IntentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(ENV_INTENT_API_KEY).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Spoken prompt texts. `{name}`, `{title}`, `{office}`, `{grade}` and `{student}` are
/// substituted where the screen has them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub welcome: String,
    pub greeting: String,
    pub menu: String,
    pub not_understood: String,
    pub attendance_ask: String,
    pub attendance_result: String,
    pub contract_text: String,
    pub contract_ask: String,
    pub registration_form: String,
    pub grade_ask: String,
    pub staff_direction: String,
    pub direct_staff_direction: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            welcome: "Okulumuza hoş geldiniz.".to_string(),
            greeting: "Merhaba, size nasıl yardımcı olabilirim?".to_string(),
            menu: "Devamsızlık sorgulama, kayıt işlemleri veya öğretmen ofisi için bir seçim yapın."
                .to_string(),
            not_understood: "Üzgünüm, anlayamadım. Lütfen tekrar söyler misiniz?".to_string(),
            attendance_ask: "Lütfen öğrencinin adını ve soyadını söyleyin.".to_string(),
            attendance_result: "{student} için devamsızlık bilgileri ekranda.".to_string(),
            contract_text: "Kayıt sözleşmesi. Öğrenci ve veli, okul yönetmeliğine uymayı kabul eder. \
                Kişisel veriler yalnızca kayıt işlemleri için kullanılır. \
                Okul, gerekli gördüğü durumlarda veliyle iletişime geçer."
                .to_string(),
            contract_ask: "Sözleşmeyi kabul ediyor musunuz? Evet veya hayır deyin.".to_string(),
            registration_form: "Lütfen kayıt formunu doldurun.".to_string(),
            grade_ask: "Öğrenciniz kaçıncı sınıfta?".to_string(),
            staff_direction: "{grade}. sınıflardan {title} {name} sorumlu. Ofisi {office}."
                .to_string(),
            direct_staff_direction: "{title} {name}, {office} konumunda.".to_string(),
        }
    }
}

/// Substitute `{key}` placeholders in a prompt template.
pub fn fill_prompt(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = KioskConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.listener.reconcile_interval(), Duration::from_millis(300));
        assert_eq!(cfg.screens.transition_cooldown(), Duration::from_millis(1500));
        assert_eq!(cfg.screens.countdown(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: KioskConfig = toml::from_str(
            r#"
            [speech]
            rate = 1.2

            [guard]
            buffer_ms = 1000
            "#,
        )
        .unwrap();
        assert!((cfg.speech.rate - 1.2).abs() < f32::EPSILON);
        assert_eq!(cfg.speech.chunk_max_chars, 100);
        assert_eq!(cfg.guard.buffer(), Duration::from_millis(1000));
        assert_eq!(cfg.presence.confirm_threshold, 1);
    }

    #[test]
    fn rejects_zero_threshold() {
        let mut cfg = KioskConfig::default();
        cfg.presence.confirm_threshold = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = KioskConfig::load_from(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(cfg.app_name, "Okul Danışma");
    }

    #[test]
    fn toml_dump_round_trips_sections() {
        let dump = KioskConfig::default().to_toml().unwrap();
        assert!(dump.contains("[speech]"));
        assert!(dump.contains("by_grade"));
    }

    #[test]
    fn fill_prompt_replaces_known_keys() {
        let out = fill_prompt("{title} {name}, {office}.", &[("name", "Ayşe"), ("title", "Müdür"), ("office", "A-12")]);
        assert_eq!(out, "Müdür Ayşe, A-12.");
    }
}
