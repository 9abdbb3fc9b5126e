//! Typed signal bus for cross-component status (camera, face presence, contract reading,
//! screen transitions). Each signal is its own broadcast topic so payload shapes are checked
//! at compile time and subscribers only see what they asked for.

use crate::screen::TransitionRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// Camera stream status reported by the capture side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    Active,
    Inactive,
}

/// One face-analysis result for a camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceSample {
    pub detected: bool,
    pub facing_target: bool,
}

impl PresenceSample {
    pub fn facing() -> Self {
        Self {
            detected: true,
            facing_target: true,
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn qualifies(self) -> bool {
        self.detected && self.facing_target
    }
}

/// A single typed broadcast topic.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to current subscribers. Returns how many received it (0 when nobody listens).
    pub fn publish(&self, value: T) -> usize {
        self.tx.send(value).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// All process-wide signals. Cheap to clone; clones share the same topics.
#[derive(Debug, Clone)]
pub struct SignalBus {
    pub camera: Topic<CameraStatus>,
    pub presence: Topic<PresenceSample>,
    /// True while the registration contract is being read aloud.
    pub contract_reading: Topic<bool>,
    pub transitions: Topic<TransitionRecord>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self {
            camera: Topic::new(DEFAULT_TOPIC_CAPACITY),
            presence: Topic::new(DEFAULT_TOPIC_CAPACITY),
            contract_reading: Topic::new(DEFAULT_TOPIC_CAPACITY),
            transitions: Topic::new(DEFAULT_TOPIC_CAPACITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{ScreenKind, TransitionCause};

    #[tokio::test]
    async fn subscribers_see_only_their_topic() {
        let bus = SignalBus::new();
        let mut camera = bus.camera.subscribe();
        let mut presence = bus.presence.subscribe();

        assert_eq!(bus.camera.publish(CameraStatus::Inactive), 1);
        assert_eq!(bus.presence.publish(PresenceSample::facing()), 1);

        assert_eq!(camera.recv().await.unwrap(), CameraStatus::Inactive);
        assert!(presence.recv().await.unwrap().qualifies());
        assert!(camera.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = SignalBus::new();
        assert_eq!(bus.contract_reading.publish(true), 0);
        assert_eq!(
            bus.transitions.publish(TransitionRecord::now(
                ScreenKind::Start,
                ScreenKind::PresenceCheck,
                TransitionCause::Presence,
            )),
            0
        );
    }

    #[test]
    fn clones_share_topics() {
        let bus = SignalBus::new();
        let clone = bus.clone();
        let _rx = bus.camera.subscribe();
        assert_eq!(clone.camera.subscriber_count(), 1);
    }

    #[test]
    fn sample_qualification() {
        assert!(!PresenceSample { detected: true, facing_target: false }.qualifies());
        assert!(!PresenceSample::absent().qualifies());
    }
}
