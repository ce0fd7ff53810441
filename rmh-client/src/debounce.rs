//! Debounce gate
//!
//! Rate-limits signal emission from one client. Hand raises and X-cards share
//! a single gate, so raising a hand and immediately pulling the X-card is
//! throttled too.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Minimum-interval throttle shared by every signal a client emits
#[derive(Debug, Default)]
pub struct DebounceGate {
    /// When the last signal passed the gate; `None` until the first one
    last_signal_at: Mutex<Option<Instant>>,
}

impl DebounceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass the gate if `timeout` has elapsed since the last success
    ///
    /// On success the anchor moves to now. On failure nothing changes.
    /// A zero timeout never throttles.
    pub fn try_consume(&self, timeout: Duration) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_signal_at
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let passed = match *last {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= timeout,
        };

        if passed {
            *last = Some(now);
        } else {
            debug!(timeout_secs = timeout.as_secs(), "Signal throttled");
        }
        passed
    }

    /// Whether a signal would pass right now, without consuming
    pub fn would_pass(&self, timeout: Duration) -> bool {
        let last = self
            .last_signal_at
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match *last {
            None => true,
            Some(at) => Instant::now().saturating_duration_since(at) >= timeout,
        }
    }

    pub fn last_signal_at(&self) -> Option<Instant> {
        *self
            .last_signal_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
