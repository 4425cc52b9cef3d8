//! Disconnect-storm detector
//!
//! Counts workers returned disconnected. When `bound` of them arrive within
//! `window` of the first one, with no connected return in between, the
//! detector trips and resets.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Window {
    count: usize,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct DisconnectDetector {
    /// 0 disables detection
    bound: usize,
    window: Duration,
    state: Mutex<Window>,
}

impl DisconnectDetector {
    pub fn new(bound: usize, window: Duration) -> Self {
        Self {
            bound,
            window,
            state: Mutex::new(Window::default()),
        }
    }

    /// Record a disconnected return; true when the storm bound is reached
    pub fn record_disconnect(&self) -> bool {
        self.record_disconnect_at(Instant::now())
    }

    /// `record_disconnect` with an explicit clock reading
    pub fn record_disconnect_at(&self, now: Instant) -> bool {
        if self.bound == 0 {
            return false;
        }

        let mut state = self.state.lock();
        let expired = state
            .opened_at
            .map_or(true, |opened| now.saturating_duration_since(opened) > self.window);
        if expired {
            state.count = 0;
            state.opened_at = Some(now);
        }

        state.count += 1;
        if state.count >= self.bound {
            *state = Window::default();
            return true;
        }
        false
    }

    /// Record a connected return, which ends the current burst
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.count > 0 {
            *state = Window::default();
        }
    }

    /// Disconnects counted in the current window
    pub fn count(&self) -> usize {
        self.state.lock().count
    }
}
