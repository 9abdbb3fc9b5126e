//! Self-trigger guard: the kiosk must not answer its own voice.
//!
//! The speech output marks a shared [`SpokeClock`] when each utterance starts and ends.
//! A transcript is only accepted once `buffer` has passed since that mark.

use crate::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// "System last spoke at T", shared between speech output (writer) and guards (readers).
#[derive(Debug, Clone, Default)]
pub struct SpokeClock {
    last: Arc<Mutex<Option<Instant>>>,
}

impl SpokeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.mark_at(Instant::now());
    }

    pub fn mark_at(&self, at: Instant) {
        *lock(&self.last) = Some(at);
    }

    pub fn last_spoke(&self) -> Option<Instant> {
        *lock(&self.last)
    }

    /// Time since the last mark, `None` if nothing was ever spoken.
    pub fn quiet_for(&self, now: Instant) -> Option<Duration> {
        self.last_spoke().map(|t| now.saturating_duration_since(t))
    }
}

/// Accept `now` only if at least `buffer` has elapsed since `last_spoke`.
pub fn outside_buffer(last_spoke: Option<Instant>, now: Instant, buffer: Duration) -> bool {
    match last_spoke {
        Some(t) => now.saturating_duration_since(t) >= buffer,
        None => true,
    }
}

/// Per-screen transcript filter.
#[derive(Debug, Clone)]
pub struct SelfTriggerGuard {
    clock: SpokeClock,
    buffer: Duration,
}

impl SelfTriggerGuard {
    pub fn new(clock: SpokeClock, buffer: Duration) -> Self {
        Self { clock, buffer }
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    pub fn accepts_at(&self, now: Instant) -> bool {
        outside_buffer(self.clock.last_spoke(), now, self.buffer)
    }

    /// Check a transcript against the clock. Rejections are logged, never surfaced.
    pub fn admit(&self, transcript: &str) -> bool {
        let now = Instant::now();
        let accepted = self.accepts_at(now);
        if !accepted {
            debug!(
                transcript,
                quiet_ms = self.clock.quiet_for(now).map(|d| d.as_millis() as u64),
                buffer_ms = self.buffer.as_millis() as u64,
                "dropping transcript heard right after the kiosk spoke"
            );
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_spoken_accepts() {
        assert!(outside_buffer(None, Instant::now(), Duration::from_millis(900)));
    }

    #[test]
    fn boundary_is_inclusive() {
        let t = Instant::now();
        let b = Duration::from_millis(800);
        assert!(!outside_buffer(Some(t), t + Duration::from_millis(799), b));
        assert!(outside_buffer(Some(t), t + b, b));
        assert!(outside_buffer(Some(t), t + Duration::from_secs(5), b));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_follows_clock() {
        let clock = SpokeClock::new();
        let guard = SelfTriggerGuard::new(clock.clone(), Duration::from_millis(900));
        assert!(guard.admit("evet"));

        clock.mark();
        assert!(!guard.admit("evet"));
        tokio::time::advance(Duration::from_millis(899)).await;
        assert!(!guard.admit("evet"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(guard.admit("evet"));
    }
}
