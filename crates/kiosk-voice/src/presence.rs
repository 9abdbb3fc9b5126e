//! Face presence confirmation.
//!
//! Camera analysis publishes `PresenceSample`s; the detector counts consecutive qualifying
//! samples (detected and facing the kiosk) and confirms presence once per visit.

use kiosk_core::{CameraStatus, PresenceSample};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Consecutive-sample counter with a one-shot latch.
#[derive(Debug, Clone)]
pub struct PresenceDetector {
    threshold: u32,
    consecutive: u32,
    confirmed: bool,
    camera_active: bool,
}

impl PresenceDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
            confirmed: false,
            camera_active: true,
        }
    }

    /// Feed one sample. Returns true exactly once, when the threshold is first reached.
    pub fn observe(&mut self, sample: PresenceSample) -> bool {
        if self.confirmed || !self.camera_active {
            return false;
        }
        if sample.qualifies() {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        if self.consecutive >= self.threshold {
            self.confirmed = true;
            info!(samples = self.consecutive, "👤 presence confirmed");
            return true;
        }
        false
    }

    /// An inactive camera clears the counter and the latch; samples are ignored until it
    /// is active again.
    pub fn set_camera(&mut self, status: CameraStatus) {
        match status {
            CameraStatus::Active => self.camera_active = true,
            CameraStatus::Inactive => {
                debug!("camera inactive; presence detection reset");
                self.camera_active = false;
                self.reset();
            }
        }
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.confirmed = false;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn camera_active(&self) -> bool {
        self.camera_active
    }
}

/// How a deferred transition got released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Output went idle.
    Quiet,
    /// Output was still busy when the fallback timer fired.
    Fallback,
}

/// Wait until speech output is idle, but no longer than `fallback`.
pub async fn wait_for_handoff(mut speaking: watch::Receiver<bool>, fallback: Duration) -> Handoff {
    let quiet = async {
        loop {
            if !*speaking.borrow_and_update() {
                return;
            }
            if speaking.changed().await.is_err() {
                return;
            }
        }
    };
    tokio::select! {
        _ = quiet => Handoff::Quiet,
        _ = tokio::time::sleep(fallback) => Handoff::Fallback,
    }
}
