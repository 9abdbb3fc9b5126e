//! Per-screen inactivity countdown.
//!
//! Started when a terminal screen settles. On expiry it sends its message exactly once;
//! cancelling (or dropping) it first sends nothing.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

pub struct ScreenCountdown {
    token: CancellationToken,
    remaining: watch::Receiver<u64>,
}

impl ScreenCountdown {
    /// Spawn the countdown; `message` goes to `tx` when `duration` runs out.
    pub fn start<T: Send + 'static>(
        duration: Duration,
        tx: mpsc::UnboundedSender<T>,
        message: T,
    ) -> Self {
        let token = CancellationToken::new();
        let (remaining_tx, remaining) = watch::channel(whole_secs(duration));
        let deadline = Instant::now() + duration;
        let cancelled = token.clone();

        tokio::spawn(async move {
            loop {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        debug!("countdown cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(left.min(TICK)) => {}
                }
                remaining_tx.send_replace(whole_secs(
                    deadline.saturating_duration_since(Instant::now()),
                ));
            }
            if !cancelled.is_cancelled() {
                debug!("⏳ countdown expired");
                let _ = tx.send(message);
            }
        });

        Self { token, remaining }
    }

    /// Seconds left, rounded up.
    pub fn remaining_secs(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ScreenCountdown {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn whole_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_fires_exactly_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = ScreenCountdown::start(Duration::from_secs(30), tx, "timeout");
        assert_eq!(countdown.remaining_secs(), 30);

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(countdown.remaining_secs(), 20);
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(rx.recv().await, Some("timeout"));
        assert_eq!(countdown.remaining_secs(), 0);

        // The task has finished and dropped its sender.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_before_expiry_fires_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = ScreenCountdown::start(Duration::from_secs(30), tx, "timeout");
        tokio::time::sleep(Duration::from_secs(29)).await;
        drop(countdown);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = ScreenCountdown::start(Duration::from_secs(1), tx, 1u8);
        countdown.cancel();
        countdown.cancel();
        assert!(countdown.is_cancelled());
        assert_eq!(rx.recv().await, None);
    }
}
