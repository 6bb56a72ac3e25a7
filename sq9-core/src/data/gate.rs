//! Request gate for provider rate limiting and bans.
//!
//! A 403 closes the gate immediately; repeated 429/5xx responses close it
//! after a threshold. While closed, every request is refused until the
//! cooldown elapses.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    closed_at: Option<Instant>,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct RequestGate {
    state: Mutex<GateState>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl RequestGate {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 10-minute cooldown after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(10 * 60), 3)
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request may be sent now. Reopens the gate once the cooldown has passed.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        match state.closed_at {
            None => true,
            Some(at) if at.elapsed() >= self.cooldown => {
                *state = GateState::default();
                true
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            state.closed_at = Some(Instant::now());
        }
    }

    /// Close immediately (403 Forbidden).
    pub fn close(&self) {
        self.lock().closed_at = Some(Instant::now());
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().closed_at {
            None => Duration::ZERO,
            Some(at) => self.cooldown.saturating_sub(at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_open() {
        assert!(RequestGate::default_provider().is_open());
    }

    #[test]
    fn closes_after_threshold() {
        let gate = RequestGate::new(Duration::from_secs(60), 2);
        gate.record_failure();
        assert!(gate.is_open());
        gate.record_failure();
        assert!(!gate.is_open());
        assert!(gate.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn success_resets_failures() {
        let gate = RequestGate::new(Duration::from_secs(60), 2);
        gate.record_failure();
        gate.record_success();
        gate.record_failure();
        assert!(gate.is_open());
    }

    #[test]
    fn reopens_after_cooldown() {
        let gate = RequestGate::new(Duration::from_millis(10), 1);
        gate.close();
        assert!(!gate.is_open());
        std::thread::sleep(Duration::from_millis(15));
        assert!(gate.is_open());
        assert_eq!(gate.remaining_cooldown(), Duration::ZERO);
    }
}
