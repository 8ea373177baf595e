//! Cache-bypass admission control.
//!
//! A newly-seen (or long-idle) client may force an out-of-band refresh
//! instead of waiting for the next scheduled cycle. Admissions are
//! bounded by a fixed window: `allowance` starts at `capacity` and is
//! restored by resetting the window once `window_duration` has elapsed
//! since `window_start`.
//!
//! Coordination with the refresh loop uses an mpsc/oneshot rendezvous:
//! the caller sends a [`BypassResponder`] into the loop's request queue
//! and awaits it; the loop fires the responder once the (possibly
//! rate-limited) refresh attempt is over. Both waits are bounded by the
//! caller, never by this module.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Fired by the refresh loop when a bypass request has been processed.
pub type BypassResponder = oneshot::Sender<()>;

/// Sending half handed to `client_get_configs` callers.
pub type BypassSender = mpsc::Sender<BypassResponder>;

/// Receiving half owned by the refresh loop.
pub type BypassReceiver = mpsc::Receiver<BypassResponder>;

/// The queue carries rendezvous handles, not data; a single slot keeps
/// the "request accepted into processing" signal meaningful.
pub fn bypass_channel() -> (BypassSender, BypassReceiver) {
    mpsc::channel(1)
}

pub struct BypassRateLimiter {
    window_start: Instant,
    window_duration: Duration,
    capacity: u32,
    allowance: u32,
}

impl BypassRateLimiter {
    pub fn new(capacity: u32, window_duration: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            window_duration,
            capacity,
            allowance: capacity,
        }
    }

    /// Admit or reject one bypass request, resetting the window first
    /// if it has elapsed.
    pub fn try_admit(&mut self) -> bool {
        let now = Instant::now();
        if now > self.window_start + self.window_duration {
            self.window_start = now;
            self.allowance = self.capacity;
        }
        if self.allowance == 0 {
            return false;
        }
        self.allowance -= 1;
        true
    }

    /// The window tracks the refresh cadence; retune it when the
    /// backend overrides the refresh interval.
    pub fn set_window_duration(&mut self, window_duration: Duration) {
        self.window_duration = window_duration;
    }
}
