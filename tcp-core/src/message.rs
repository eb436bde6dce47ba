//! The two messages exchanged between a sender and its peer's receiver.
//!
//! A [`Segment`] flows sender → receiver and carries sequence-space data.
//! A [`ReceiverFeedback`] flows back and carries the acknowledgment number
//! and the advertised window.  [`crate::packet::Packet`] glues one of each
//! together for the wire.

use crate::wrapping::Wrap32;

/// One unit of outbound data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    /// Sequence number of the SYN if present, otherwise of the first payload byte.
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
    /// Abort the connection.  Consumes no sequence number.
    pub rst: bool,
}

impl Segment {
    /// Number of sequence numbers this segment occupies.
    ///
    /// SYN and FIN each count as one, in addition to every payload byte.
    pub fn sequence_length(&self) -> u64 {
        u64::from(self.syn) + self.payload.len() as u64 + u64::from(self.fin)
    }
}

/// Acknowledgment and flow-control state reported by a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverFeedback {
    /// Next sequence number the receiver needs; `None` until a SYN arrives.
    pub ackno: Option<Wrap32>,
    /// Bytes the receiver is still willing to accept.
    pub window_size: u16,
    pub rst: bool,
}
