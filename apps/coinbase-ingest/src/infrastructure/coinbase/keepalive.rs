//! Keepalive Probing
//!
//! Session liveness for the feed connection: a WebSocket ping on a fixed
//! cadence and a bounded pong deadline. A missed deadline is treated as a
//! connection loss and routes through the normal reconnect path.
//!
//! The state machine is driven inline from the client's select loop rather
//! than from a separate task; the client owns the socket write half, so the
//! probe and the deadline check happen on its ping-interval ticks.

use std::time::{Duration, Instant};

/// Configuration for keepalive behavior.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Interval between ping probes.
    pub ping_interval: Duration,
    /// How long to wait for a pong before declaring the connection dead.
    pub pong_timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(20),
        }
    }
}

/// Pong-deadline tracking between select-loop iterations.
#[derive(Debug)]
pub struct KeepaliveState {
    last_pong: Instant,
    awaiting_pong: bool,
}

impl Default for KeepaliveState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeepaliveState {
    /// Fresh state for a new connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_pong: Instant::now(),
            awaiting_pong: false,
        }
    }

    /// Record a pong (or any inbound traffic that proves liveness).
    pub fn record_pong(&mut self) {
        self.last_pong = Instant::now();
        self.awaiting_pong = false;
    }

    /// Mark that a ping went out and a pong is now owed.
    pub fn mark_ping_sent(&mut self) {
        self.awaiting_pong = true;
    }

    /// Whether the pong deadline has passed.
    #[must_use]
    pub fn timed_out(&self, pong_timeout: Duration) -> bool {
        self.awaiting_pong && self.last_pong.elapsed() > pong_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = KeepaliveConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(20));
        assert_eq!(config.pong_timeout, Duration::from_secs(20));
    }

    #[test]
    fn fresh_state_is_not_timed_out() {
        let state = KeepaliveState::new();
        assert!(!state.timed_out(Duration::from_millis(1)));
    }

    #[test]
    fn pong_clears_the_deadline() {
        let mut state = KeepaliveState::new();
        state.mark_ping_sent();
        state.record_pong();
        assert!(!state.timed_out(Duration::ZERO));
    }

    #[test]
    fn missed_pong_times_out() {
        let mut state = KeepaliveState::new();
        state.mark_ping_sent();
        std::thread::sleep(Duration::from_millis(15));
        assert!(state.timed_out(Duration::from_millis(10)));
    }

    #[test]
    fn deadline_only_applies_while_awaiting_pong() {
        let state = KeepaliveState::new();
        std::thread::sleep(Duration::from_millis(15));
        // No ping outstanding, so an old last_pong is not a timeout.
        assert!(!state.timed_out(Duration::from_millis(10)));
    }
}
