//! 32-bit wrap-around sequence numbers.
//!
//! Every SYN, payload byte, and FIN occupies one slot in a connection's
//! sequence space.  On the wire that position is a [`Wrap32`] relative to
//! the connection's Initial Sequence Number (ISN) and silently wraps at
//! 2^32.  Inside the engine we track positions as 64-bit **absolute**
//! sequence numbers (the SYN is absolute 0) that never wrap.
//!
//! Converting back from a [`Wrap32`] is ambiguous: every value stands for an
//! infinite residue class `raw + k·2^32`.  [`Wrap32::unwrap`] resolves the
//! ambiguity with a *checkpoint*, the most recent absolute position the
//! caller knows about, and returns the member of the class closest to it.

use std::fmt;
use std::ops::{Add, Sub};

/// Length of one period of the 32-bit sequence space.
const PERIOD: u64 = 1 << 32;

/// A sequence number modulo 2^32.
///
/// Ordering is deliberately **not** derived: whether `a < b` depends on which
/// period each value belongs to, which only [`Wrap32::unwrap`] can decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Wrap32(u32);

impl Wrap32 {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The on-wire 32-bit value.
    pub const fn raw_value(self) -> u32 {
        self.0
    }

    /// Convert absolute sequence number `n` to its wrapped form relative to
    /// `zero_point`.
    pub fn wrap(n: u64, zero_point: Wrap32) -> Self {
        // Truncation to the low 32 bits is exactly `n mod 2^32`.
        zero_point + n as u32
    }

    /// Convert back to the absolute sequence number closest to `checkpoint`.
    ///
    /// Candidates are `raw`, `raw ± 2^32`, ... where
    /// `raw = self - zero_point (mod 2^32)`.  When two candidates are equally
    /// far from `checkpoint` (a distance of exactly 2^31) the lower one wins.
    /// Exact for every `checkpoint` up to `u64::MAX`.
    pub fn unwrap(self, zero_point: Wrap32, checkpoint: u64) -> u64 {
        let raw = u64::from(self.0.wrapping_sub(zero_point.0));

        // Same period as the checkpoint, then at most one period either side.
        let candidate = (checkpoint & !(PERIOD - 1)) | raw;
        let distance = |v: u64| v.abs_diff(checkpoint);

        let mut best = candidate;
        if let Some(lower) = candidate.checked_sub(PERIOD) {
            if distance(lower) <= distance(best) {
                best = lower;
            }
        }
        if let Some(upper) = candidate.checked_add(PERIOD) {
            if distance(upper) < distance(best) {
                best = upper;
            }
        }
        best
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, rhs: u32) -> Wrap32 {
        Wrap32(self.0.wrapping_add(rhs))
    }
}

/// Forward distance from `rhs` to `self` in sequence space.
impl Sub for Wrap32 {
    type Output = u32;

    fn sub(self, rhs: Wrap32) -> u32 {
        self.0.wrapping_sub(rhs.0)
    }
}

impl fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
