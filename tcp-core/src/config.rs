//! Tunable parameters shared by the sender, receiver, and connection.

use crate::wrapping::Wrap32;

/// Default byte-stream capacity in each direction.
pub const DEFAULT_CAPACITY: u64 = 64_000;

/// Default initial retransmission timeout.
pub const DEFAULT_INITIAL_RTO_MS: u64 = 1000;

/// Largest payload carried by a single segment.
pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// Consecutive retransmissions tolerated before a connection gives up.
pub const MAX_RETX_ATTEMPTS: u64 = 8;

/// Per-connection configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Capacity of the outbound and inbound byte streams.
    pub capacity: u64,
    /// RTO before any backoff, in milliseconds.
    pub initial_rto_ms: u64,
    /// Upper bound on payload bytes per segment.
    pub max_payload_size: usize,
    /// Abort after this many consecutive retransmissions.
    pub max_retx_attempts: u64,
    /// Use this ISN instead of a random one (tests and simulations).
    pub fixed_isn: Option<Wrap32>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            initial_rto_ms: DEFAULT_INITIAL_RTO_MS,
            max_payload_size: MAX_PAYLOAD_SIZE,
            max_retx_attempts: MAX_RETX_ATTEMPTS,
            fixed_isn: None,
        }
    }
}

impl TcpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_initial_rto_ms(mut self, rto_ms: u64) -> Self {
        self.initial_rto_ms = rto_ms;
        self
    }

    /// Clamped to at least one byte so data can always make progress.
    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size.max(1);
        self
    }

    pub fn with_max_retx_attempts(mut self, attempts: u64) -> Self {
        self.max_retx_attempts = attempts;
        self
    }

    pub fn with_fixed_isn(mut self, isn: Wrap32) -> Self {
        self.fixed_isn = Some(isn);
        self
    }
}
