//! Outbound half of a connection.
//!
//! [`Sender`] turns the bytes an application writes into an outbound byte
//! stream into a sequence of [`Segment`]s.  It does **not** touch the network;
//! the caller pulls segments with [`Sender::maybe_send`], delivers the peer's
//! [`ReceiverFeedback`] with [`Sender::receive`], and advances time with
//! [`Sender::tick`].
//!
//! # Contract
//! - The first [`Sender::push`] queues a lone SYN.  No data is carved until
//!   that SYN is acknowledged.
//! - Data segments are at most `min(window space, max_payload_size)` long.
//!   A zero window is treated as a one-sequence-number window so a probe
//!   still goes out.
//! - FIN rides on the last data segment when the window has room for it,
//!   otherwise it is sent alone.  It is sent at most once.
//! - When the retransmission timer fires, the earliest outstanding segment
//!   is resent once.  The RTO doubles only if the peer's window was open.
//!
//! # Sequence-number layout
//!
//! ```text
//!  acked_abs          sent_abs          next_abs      window edge
//!      │                  │                 │               │
//!  ────┼──────────────────┼─────────────────┼───────────────┼──▶ absolute seq
//!      │<─ outstanding ──▶│<─── queued ────▶│<── sendable ─▶│
//! ```

use std::collections::VecDeque;

use rand::Rng;

use crate::byte_stream::{Reader, StreamStatus};
use crate::config::TcpConfig;
use crate::message::{ReceiverFeedback, Segment};
use crate::state::SenderState;
use crate::timer::RetransmitTimer;
use crate::wrapping::Wrap32;

// ---------------------------------------------------------------------------
// SentSegment
// ---------------------------------------------------------------------------

/// A segment together with its absolute sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SentSegment {
    abs_seqno: u64,
    segment: Segment,
}

impl SentSegment {
    fn end(&self) -> u64 {
        self.abs_seqno + self.segment.sequence_length()
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Send-side state for one connection.
#[derive(Debug)]
pub struct Sender {
    isn: Wrap32,
    max_payload_size: usize,
    timer: RetransmitTimer,

    /// Milliseconds elapsed since construction, advanced only by `tick`.
    now_ms: u64,
    consecutive_retransmissions: u64,

    /// Absolute sequence number the next queued segment will start at.
    next_abs: u64,
    /// Start of the earliest segment that is not yet fully acknowledged.
    acked_abs: u64,
    /// One past the highest sequence number ever handed to `maybe_send`'s caller.
    sent_abs: u64,

    /// Left edge of the peer's window (its most recent valid ackno).
    window_left: u64,
    /// Size of the peer's window as last advertised.
    window_size: u16,

    syn_sent: bool,
    fin_sent: bool,
    resend_pending: bool,

    /// Queued but never transmitted, in sequence order.
    queued: VecDeque<SentSegment>,
    /// Transmitted but not fully acknowledged, in sequence order.
    outstanding: VecDeque<SentSegment>,
}

impl Sender {
    /// Create a sender.  Uses `config.fixed_isn` if set, else a random ISN.
    pub fn new(config: &TcpConfig) -> Self {
        let isn = config
            .fixed_isn
            .unwrap_or_else(|| Wrap32::new(rand::rng().random()));
        Self {
            isn,
            max_payload_size: config.max_payload_size.max(1),
            timer: RetransmitTimer::new(config.initial_rto_ms),
            now_ms: 0,
            consecutive_retransmissions: 0,
            next_abs: 0,
            acked_abs: 0,
            sent_abs: 0,
            window_left: 0,
            // Assume room for the SYN until the peer says otherwise.
            window_size: 1,
            syn_sent: false,
            fin_sent: false,
            resend_pending: false,
            queued: VecDeque::new(),
            outstanding: VecDeque::new(),
        }
    }

    /// Carve as many segments from `outbound` as the peer's window allows.
    pub fn push<R: Reader + ?Sized>(&mut self, outbound: &mut R) {
        if !self.syn_sent {
            self.syn_sent = true;
            let fin = outbound.is_finished();
            self.fin_sent = fin;
            self.enqueue(Segment {
                syn: true,
                fin,
                rst: outbound.has_error(),
                ..Default::default()
            });
            return;
        }

        if !self.syn_acked() || self.fin_sent {
            return;
        }

        loop {
            let room = self.window_edge().saturating_sub(self.next_abs);
            if room == 0 {
                break;
            }
            let payload = outbound.read(room.min(self.max_payload_size as u64));
            let fin = outbound.is_finished() && (payload.len() as u64) < room;
            if payload.is_empty() && !fin {
                break;
            }
            self.fin_sent = fin;
            self.enqueue(Segment {
                payload,
                fin,
                rst: outbound.has_error(),
                ..Default::default()
            });
            if fin {
                break;
            }
        }
    }

    /// Next segment to put on the wire, if any.
    ///
    /// Never-sent segments come first, in order.  After the timer fires the
    /// earliest outstanding segment is returned once more.
    pub fn maybe_send(&mut self) -> Option<Segment> {
        if let Some(entry) = self.queued.pop_front() {
            self.sent_abs = self.sent_abs.max(entry.end());
            let segment = entry.segment.clone();
            self.outstanding.push_back(entry);
            return Some(segment);
        }

        if self.resend_pending {
            self.resend_pending = false;
            if let Some(entry) = self.outstanding.front() {
                log::debug!(
                    "[sender] retransmit seq={} len={} rto={}ms",
                    entry.segment.seqno,
                    entry.segment.sequence_length(),
                    self.timer.current_rto_ms()
                );
                return Some(entry.segment.clone());
            }
        }
        None
    }

    /// A segment that occupies no sequence numbers, for carrying a bare ACK.
    pub fn send_empty_message<S: StreamStatus + ?Sized>(&self, outbound: &S) -> Segment {
        Segment {
            seqno: Wrap32::wrap(self.next_abs, self.isn),
            rst: outbound.has_error(),
            ..Default::default()
        }
    }

    /// Process acknowledgment and window feedback from the peer's receiver.
    pub fn receive(&mut self, feedback: &ReceiverFeedback) {
        let Some(ackno) = feedback.ackno else {
            return;
        };

        let ack_abs = ackno.unwrap(self.isn, self.next_abs);
        if ack_abs < self.acked_abs || ack_abs > self.sent_abs {
            log::debug!(
                "[sender] ignoring ack {} outside [{}, {}]",
                ack_abs,
                self.acked_abs,
                self.sent_abs
            );
            return;
        }

        self.window_left = ack_abs;
        self.window_size = feedback.window_size;

        let mut retired_front = false;
        while let Some(front) = self.outstanding.front() {
            if front.end() > ack_abs {
                break;
            }
            self.acked_abs = front.end();
            self.outstanding.pop_front();
            retired_front = true;
        }
        if retired_front {
            // The segment marked for resend has been acknowledged.
            self.resend_pending = false;
        }

        self.timer.reset_rto();
        self.consecutive_retransmissions = 0;
        if self.sequence_numbers_in_flight() == 0 {
            self.timer.stop();
        } else if retired_front {
            // Only progress restarts the clock; repeated acks leave it running.
            self.timer.start(self.now_ms);
        }
        log::trace!(
            "[sender] ack={} window={} in_flight={} timer_armed={}",
            ack_abs,
            self.window_size,
            self.sequence_numbers_in_flight(),
            self.timer.is_armed()
        );
    }

    /// Advance the clock by `ms_since_last_tick` and fire the timer if due.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.now_ms = self.now_ms.saturating_add(ms_since_last_tick);
        if !self.timer.expired(self.now_ms) {
            return;
        }
        log::trace!(
            "[sender] timer {:?} expired at {}ms (rto={}ms)",
            self.timer.state(),
            self.now_ms,
            self.timer.current_rto_ms()
        );

        if self.outstanding.is_empty() {
            // Nothing has reached the wire yet, so there is nothing to resend.
            if self.sequence_numbers_in_flight() > 0 {
                self.timer.start(self.now_ms);
            } else {
                self.timer.stop();
            }
            return;
        }

        self.resend_pending = true;
        // A closed window is flow control, not congestion.
        if self.window_size != 0 {
            self.timer.back_off();
            self.consecutive_retransmissions += 1;
        }
        self.timer.start(self.now_ms);
    }

    /// Sequence numbers queued or outstanding (SYN and FIN included).
    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.next_abs - self.acked_abs
    }

    /// Timeouts since the last valid acknowledgment.
    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retransmissions
    }

    pub fn isn(&self) -> Wrap32 {
        self.isn
    }

    pub fn current_rto_ms(&self) -> u64 {
        self.timer.current_rto_ms()
    }

    /// Window most recently advertised by the peer.
    pub fn peer_window(&self) -> u16 {
        self.window_size
    }

    pub fn state(&self) -> SenderState {
        if !self.syn_sent {
            SenderState::Closed
        } else if !self.syn_acked() {
            SenderState::SynSent
        } else if !self.fin_sent {
            SenderState::Established
        } else if self.sequence_numbers_in_flight() > 0 {
            SenderState::FinSent
        } else {
            SenderState::FinAcked
        }
    }

    fn syn_acked(&self) -> bool {
        // The SYN is absolute 0, so any retired segment means it was acked.
        self.acked_abs > 0
    }

    /// One past the last sequence number the peer will accept.
    fn window_edge(&self) -> u64 {
        self.window_left + u64::from(self.window_size.max(1))
    }

    fn enqueue(&mut self, mut segment: Segment) {
        segment.seqno = Wrap32::wrap(self.next_abs, self.isn);
        let entry = SentSegment {
            abs_seqno: self.next_abs,
            segment,
        };
        log::trace!(
            "[sender] queue seq={} syn={} len={} fin={}",
            entry.segment.seqno,
            entry.segment.syn,
            entry.segment.payload.len(),
            entry.segment.fin
        );
        self.next_abs = entry.end();
        self.queued.push_back(entry);
        self.timer.start_if_disarmed(self.now_ms);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
