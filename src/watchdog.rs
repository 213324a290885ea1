//! Stall watchdog for an active processing session.

use std::time::{Duration, Instant};

/// Flags a session as stuck when no progress arrives within `window`.
///
/// The watchdog fires at most once per arming: after [`check`](Self::check)
/// reports a stall it disarms itself, so repeated checks stay quiet.
#[derive(Debug, Clone)]
pub struct StallWatchdog {
    window: Duration,
    last_progress: Option<Instant>,
}

impl StallWatchdog {
    pub fn new(window: Duration) -> Self {
        Self { window, last_progress: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn arm(&mut self, now: Instant) {
        self.last_progress = Some(now);
    }

    /// Record a progress push. Ignored while disarmed.
    pub fn feed(&mut self, now: Instant) {
        if let Some(last) = self.last_progress.as_mut() {
            *last = now;
        }
    }

    pub fn disarm(&mut self) {
        self.last_progress = None;
    }

    pub fn is_armed(&self) -> bool {
        self.last_progress.is_some()
    }

    /// `true` exactly once when the window has been exceeded.
    pub fn check(&mut self, now: Instant) -> bool {
        match self.last_progress {
            Some(last) if now.saturating_duration_since(last) > self.window => {
                self.last_progress = None;
                true
            }
            _ => false,
        }
    }
}
