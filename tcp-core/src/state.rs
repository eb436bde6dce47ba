//! Observable lifecycle stages of each half of a connection.
//!
//! The sender and receiver do not store these enums; they are derived on
//! demand from the flags each component already keeps, so they can never
//! drift out of sync with the real state.
//!
//! ```text
//!  Sender:    Closed ──push──▶ SynSent ──ack of SYN──▶ Established
//!                                                          │ stream finished
//!                                                          ▼
//!                              FinAcked ◀──ack of FIN── FinSent
//!
//!  Receiver:  Listen ──SYN──▶ SynReceived ──stream closed──▶ FinReceived
//! ```

use std::fmt;

/// Stage of the outbound half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Nothing has been pushed yet; no SYN queued.
    #[default]
    Closed,
    /// SYN queued or sent; waiting for it to be acknowledged.
    SynSent,
    /// SYN acknowledged; data may flow.
    Established,
    /// FIN queued or sent; waiting for it to be acknowledged.
    FinSent,
    /// Every sequence number including FIN has been acknowledged.
    FinAcked,
}

/// Stage of the inbound half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// No SYN seen; every segment is dropped.
    #[default]
    Listen,
    /// SYN seen; the inbound stream is still open.
    SynReceived,
    /// Every byte up to and including FIN has been reassembled.
    FinReceived,
    /// The inbound stream has been flagged with an error.
    Error,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
