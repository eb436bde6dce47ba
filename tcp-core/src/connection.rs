//! Per-connection lifecycle manager.
//!
//! A [`Connection`] owns the complete state for one endpoint:
//! - The outbound [`ByteStream`] the application writes and the [`Sender`] drains.
//! - The inbound [`ByteStream`] the [`Reassembler`] fills and the application reads.
//! - The [`Receiver`] that translates inbound segments and produces feedback.
//!
//! It performs no I/O.  The owner moves [`Packet`]s between peers with
//! [`Connection::poll_transmit`] and [`Connection::segment_arrives`], and
//! advances time with [`Connection::tick`].
//!
//! ```text
//!   write() ──▶ outbound ──▶ Sender ──segment──┐
//!                              ▲               ├──▶ poll_transmit() ──▶ Packet
//!                              │ feedback      │
//!   Packet ──▶ segment_arrives()               │
//!                              │ segment       │
//!                              ▼               │
//!   read()  ◀── inbound ◀── Receiver ──feedback┘
//! ```
//!
//! A connection opens either actively with [`Connection::connect`] or
//! passively when the peer's SYN arrives.  After both streams have ended it
//! lingers for ten initial RTOs so that a lost final ACK can be repeated,
//! unless the peer finished first.

use thiserror::Error;

use crate::byte_stream::{ByteStream, Reader, StreamStatus, Writer};
use crate::config::TcpConfig;
use crate::packet::Packet;
use crate::reassembler::Reassembler;
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::state::{ReceiverState, SenderState};

/// Multiple of the initial RTO an endpoint lingers after a clean close.
const LINGER_RTO_MULTIPLE: u64 = 10;

/// Reasons a connection stops on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("gave up after {0} consecutive retransmissions")]
    MaxRetransmissions(u64),
}

/// One endpoint of a reliable byte-stream connection.
#[derive(Debug)]
pub struct Connection {
    config: TcpConfig,
    outbound: ByteStream,
    inbound: ByteStream,
    sender: Sender,
    receiver: Receiver,
    reassembler: Reassembler,

    /// The sender may emit segments (connect called or peer SYN seen).
    opened: bool,
    /// The peer sent sequence numbers we have not yet acknowledged.
    need_ack: bool,
    /// An RST must go out on the next poll.
    need_rst: bool,
    aborted: bool,
    /// Whether to wait after both streams end; cleared if the peer ends first.
    linger_after_close: bool,
    ms_since_last_segment: u64,
}

impl Connection {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            outbound: ByteStream::new(config.capacity),
            inbound: ByteStream::new(config.capacity),
            sender: Sender::new(&config),
            receiver: Receiver::new(),
            reassembler: Reassembler::new(),
            opened: false,
            need_ack: false,
            need_rst: false,
            aborted: false,
            linger_after_close: true,
            ms_since_last_segment: 0,
            config,
        }
    }

    /// Active open: queue the SYN.
    pub fn connect(&mut self) {
        if self.opened {
            return;
        }
        log::debug!("[conn] active open, isn={}", self.sender.isn());
        self.opened = true;
        self.sender.push(&mut self.outbound);
    }

    /// Write as much of `data` as the outbound stream has room for.
    ///
    /// Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let before = self.outbound.bytes_pushed();
        self.outbound.push(data);
        if self.opened {
            self.sender.push(&mut self.outbound);
        }
        (self.outbound.bytes_pushed() - before) as usize
    }

    /// Copy up to `buf.len()` reassembled bytes into `buf`.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let was_full = self.inbound.available_capacity() == 0;
        let data = self.inbound.read(buf.len() as u64);
        buf[..data.len()].copy_from_slice(&data);
        if was_full && !data.is_empty() && self.receiver.isn().is_some() {
            // Tell the peer its window reopened.
            self.need_ack = true;
        }
        data.len()
    }

    /// End the outbound stream; a FIN follows the remaining data.
    pub fn close(&mut self) {
        self.outbound.close();
        if self.opened {
            self.sender.push(&mut self.outbound);
        }
    }

    /// Advance time by `ms_since_last_tick`.
    ///
    /// Fails once the sender has retransmitted more than
    /// `max_retx_attempts` times in a row; the connection is then aborted and
    /// an RST is queued.
    pub fn tick(&mut self, ms_since_last_tick: u64) -> Result<(), ConnectionError> {
        if self.aborted {
            return Ok(());
        }
        self.ms_since_last_segment = self.ms_since_last_segment.saturating_add(ms_since_last_tick);
        self.sender.tick(ms_since_last_tick);

        let retx = self.sender.consecutive_retransmissions();
        if retx > self.config.max_retx_attempts {
            log::warn!("[conn] {} consecutive retransmissions; aborting", retx);
            self.abort();
            return Err(ConnectionError::MaxRetransmissions(retx));
        }
        Ok(())
    }

    /// Deliver one packet from the peer.
    pub fn segment_arrives(&mut self, packet: &Packet) {
        if self.aborted {
            return;
        }
        self.ms_since_last_segment = 0;

        let segment = packet.segment();
        if segment.rst {
            log::warn!("[conn] ← RST; aborting");
            self.outbound.set_error();
            self.inbound.set_error();
            self.aborted = true;
            return;
        }

        self.receiver
            .receive(&segment, &mut self.reassembler, &mut self.inbound);
        let peer_known = self.receiver.isn().is_some();
        if peer_known && !self.opened {
            log::debug!("[conn] passive open, isn={}", self.sender.isn());
            self.opened = true;
        }
        if self.inbound.is_closed() && !self.outbound.is_finished() {
            self.linger_after_close = false;
        }

        self.sender.receive(&packet.feedback());

        if peer_known && segment.sequence_length() > 0 {
            self.need_ack = true;
        }
        if self.opened {
            self.sender.push(&mut self.outbound);
        }

        let (sending, receiving) = self.state();
        log::trace!(
            "[conn] ← seq={} len={} sender={} receiver={}",
            segment.seqno,
            segment.sequence_length(),
            sending,
            receiving
        );
    }

    /// Next packet to hand to the network, if any.
    ///
    /// A sender segment is preferred; otherwise an empty segment is produced
    /// when an ACK or RST is owed.  Every packet carries current feedback.
    pub fn poll_transmit(&mut self) -> Option<Packet> {
        let segment = if self.aborted {
            if !self.need_rst {
                return None;
            }
            self.sender.send_empty_message(&self.outbound)
        } else if let Some(segment) = self.sender.maybe_send() {
            segment
        } else if self.need_ack {
            self.sender.send_empty_message(&self.outbound)
        } else {
            return None;
        };
        self.need_ack = false;
        self.need_rst = false;

        let feedback = self.receiver.send(&self.inbound);
        let packet = Packet::from_parts(segment, &feedback);
        log::trace!(
            "[conn] → seq={} ack={:?} flags={:#06b} len={}",
            packet.header.seq,
            feedback.ackno.map(|a| a.raw_value()),
            packet.header.flags,
            packet.payload.len()
        );
        Some(packet)
    }

    /// Whether the connection still has work to do.
    pub fn is_active(&self) -> bool {
        if self.aborted {
            return false;
        }
        let done = self.sender.state() == SenderState::FinAcked && self.inbound.is_closed();
        if !done {
            return true;
        }
        self.linger_after_close
            && self.ms_since_last_segment < LINGER_RTO_MULTIPLE * self.config.initial_rto_ms
    }

    pub fn state(&self) -> (SenderState, ReceiverState) {
        (self.sender.state(), self.receiver.state(&self.inbound))
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn inbound(&self) -> &ByteStream {
        &self.inbound
    }

    pub fn outbound(&self) -> &ByteStream {
        &self.outbound
    }

    fn abort(&mut self) {
        self.outbound.set_error();
        self.inbound.set_error();
        self.aborted = true;
        self.need_rst = true;
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
