//! Retransmission timer.
//!
//! Reliable delivery requires that unacknowledged segments are re-sent if no
//! ACK arrives within a bounded time.  [`RetransmitTimer`] tracks when it was
//! armed and the current retransmission timeout (RTO); it never reads a
//! clock.  The owner passes the current time, in milliseconds since it was
//! created, to every call.
//!
//! The RTO starts at a configured initial value, doubles on each timeout
//! that counts as congestion (exponential back-off), and returns to the
//! initial value whenever a valid acknowledgment arrives.

/// Whether the timer is running, and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Disarmed,
    Armed { since_ms: u64 },
}

/// A retransmission timer for one sender.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    state: TimerState,
    initial_rto_ms: u64,
    current_rto_ms: u64,
}

impl RetransmitTimer {
    pub fn new(initial_rto_ms: u64) -> Self {
        Self {
            state: TimerState::Disarmed,
            initial_rto_ms,
            current_rto_ms: initial_rto_ms,
        }
    }

    /// Arm (or re-arm) the timer as of `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.state = TimerState::Armed { since_ms: now_ms };
    }

    /// Arm the timer as of `now_ms` unless it is already running.
    pub fn start_if_disarmed(&mut self, now_ms: u64) {
        if self.state == TimerState::Disarmed {
            self.start(now_ms);
        }
    }

    pub fn stop(&mut self) {
        self.state = TimerState::Disarmed;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, TimerState::Armed { .. })
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// `true` when armed and at least one RTO has elapsed by `now_ms`.
    pub fn expired(&self, now_ms: u64) -> bool {
        match self.state {
            TimerState::Disarmed => false,
            TimerState::Armed { since_ms } => {
                now_ms.saturating_sub(since_ms) >= self.current_rto_ms
            }
        }
    }

    /// Double the RTO.
    pub fn back_off(&mut self) {
        self.current_rto_ms = self.current_rto_ms.saturating_mul(2);
    }

    /// Return the RTO to its initial value.
    pub fn reset_rto(&mut self) {
        self.current_rto_ms = self.initial_rto_ms;
    }

    pub fn current_rto_ms(&self) -> u64 {
        self.current_rto_ms
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_never_expires() {
        let t = RetransmitTimer::new(100);
        assert!(!t.is_armed());
        assert!(!t.expired(u64::MAX));
    }

    #[test]
    fn expires_after_exactly_one_rto() {
        let mut t = RetransmitTimer::new(100);
        t.start(50);
        assert_eq!(t.state(), TimerState::Armed { since_ms: 50 });
        assert!(!t.expired(149));
        assert!(t.expired(150));
    }

    #[test]
    fn start_if_disarmed_keeps_original_start() {
        let mut t = RetransmitTimer::new(100);
        t.start_if_disarmed(10);
        t.start_if_disarmed(90);
        assert_eq!(t.state(), TimerState::Armed { since_ms: 10 });
        t.stop();
        assert!(!t.is_armed());
    }

    #[test]
    fn back_off_doubles_and_reset_restores() {
        let mut t = RetransmitTimer::new(100);
        t.back_off();
        t.back_off();
        assert_eq!(t.current_rto_ms(), 400);
        t.start(0);
        assert!(!t.expired(399));
        assert!(t.expired(400));
        t.reset_rto();
        assert_eq!(t.current_rto_ms(), 100);
    }

    #[test]
    fn back_off_saturates() {
        let mut t = RetransmitTimer::new(u64::MAX / 2 + 1);
        t.back_off();
        assert_eq!(t.current_rto_ms(), u64::MAX);
    }
}
