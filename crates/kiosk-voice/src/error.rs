//! Error types for the kiosk voice layer

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised by speech engines and the voice coordination tasks
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),
}

/// Error kinds reported by a speech recognition engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("speech recognition is not supported")]
    Unsupported,

    #[error("no speech detected")]
    NoSpeech,

    #[error("recognition aborted")]
    Aborted,

    #[error("network failure during recognition")]
    Network,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("recognition engine error: {0}")]
    Engine(String),
}

impl RecognitionError {
    /// Map a Web Speech style error code (`no-speech`, `not-allowed`, ...) to a kind.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "no-speech" => RecognitionError::NoSpeech,
            "aborted" => RecognitionError::Aborted,
            "network" => RecognitionError::Network,
            "not-allowed" | "service-not-allowed" => RecognitionError::PermissionDenied,
            "unsupported" | "language-not-supported" => RecognitionError::Unsupported,
            other => RecognitionError::Engine(other.to_string()),
        }
    }

    /// Errors the listener recovers from by restarting the session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RecognitionError::NoSpeech
                | RecognitionError::Aborted
                | RecognitionError::Network
                | RecognitionError::Engine(_)
        )
    }

    /// One-line advisory shown to the visitor. `Aborted` is silent.
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            RecognitionError::Unsupported => Some(
                "Bu cihaz ses tanımayı desteklemiyor. Lütfen cevabınızı yazarak girin.",
            ),
            RecognitionError::NoSpeech => Some("Ses algılanamadı. Lütfen tekrar konuşun."),
            RecognitionError::Aborted => None,
            RecognitionError::Network => {
                Some("Ağ bağlantısı sorunu. Ses tanıma yeniden deneniyor.")
            }
            RecognitionError::PermissionDenied => Some(
                "Mikrofon izni verilmedi. Lütfen izin verin veya cevabınızı yazın.",
            ),
            RecognitionError::Engine(_) => Some("Ses tanıma hatası. Yeniden deneniyor."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_kinds() {
        assert_eq!(RecognitionError::from_code("no-speech"), RecognitionError::NoSpeech);
        assert_eq!(
            RecognitionError::from_code("not-allowed"),
            RecognitionError::PermissionDenied
        );
        assert_eq!(
            RecognitionError::from_code("audio-capture"),
            RecognitionError::Engine("audio-capture".into())
        );
    }

    #[test]
    fn aborted_is_silent_but_transient() {
        let e = RecognitionError::Aborted;
        assert!(e.is_transient());
        assert!(e.advisory().is_none());
        assert!(!RecognitionError::PermissionDenied.is_transient());
        assert!(RecognitionError::Unsupported.advisory().is_some());
    }
}
