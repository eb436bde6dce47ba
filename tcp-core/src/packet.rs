//! Wire-format definitions for segments.
//!
//! A [`Packet`] is what actually crosses the (simulated) network: one
//! outbound [`Segment`] from the local sender together with the local
//! receiver's [`ReceiverFeedback`] for the peer.  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed or truncated input.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Flags     |            Window Size        |               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+               +
//! |         Payload Length        |            Checksum           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The acknowledgment number is meaningful only when [`flags::ACK`] is set;
//! a receiver that has not yet seen a SYN sends zero there.

use thiserror::Error;

use crate::message::{ReceiverFeedback, Segment};
use crate::wrapping::Wrap32;

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// First segment of the stream.
    pub const SYN: u8 = 0b0000_0001;
    /// Acknowledgment field is valid.
    pub const ACK: u8 = 0b0000_0010;
    /// Last segment of the stream.
    pub const FIN: u8 = 0b0000_0100;
    /// The sending side's stream is in error.
    pub const RST: u8 = 0b0000_1000;
}

/// Byte length of the fixed-size header on the wire.
/// seq(4) + ack(4) + flags(1) + window(2) + payload_len(2) + checksum(2)
pub const HEADER_LEN: usize = 15;

/// Largest payload the 16-bit length field can describe.
pub const MAX_WIRE_PAYLOAD: usize = u16::MAX as usize;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 9;
const OFF_PAYLOAD_LEN: usize = 11;
const OFF_CHECKSUM: usize = 13;

/// Errors from encoding or decoding a datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("buffer too short to contain a header ({0} bytes)")]
    BufferTooShort(usize),
    #[error("payload_len field says {declared} bytes but {actual} remain")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum verification failed")]
    ChecksumFailed,
    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLong(usize),
}

/// Fixed-size protocol header, in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub seq: u32,
    pub ack: u32,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
    pub window: u16,
}

impl Header {
    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// A complete datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Combine an outbound segment with the feedback for the peer.
    pub fn from_parts(segment: Segment, feedback: &ReceiverFeedback) -> Self {
        let mut bits = 0;
        if segment.syn {
            bits |= flags::SYN;
        }
        if segment.fin {
            bits |= flags::FIN;
        }
        if segment.rst || feedback.rst {
            bits |= flags::RST;
        }
        if feedback.ackno.is_some() {
            bits |= flags::ACK;
        }
        Packet {
            header: Header {
                seq: segment.seqno.raw_value(),
                ack: feedback.ackno.map_or(0, Wrap32::raw_value),
                flags: bits,
                window: feedback.window_size,
            },
            payload: segment.payload,
        }
    }

    /// The sender half, for the peer's receiver.
    pub fn segment(&self) -> Segment {
        Segment {
            seqno: Wrap32::new(self.header.seq),
            syn: self.header.has(flags::SYN),
            payload: self.payload.clone(),
            fin: self.header.has(flags::FIN),
            rst: self.header.has(flags::RST),
        }
    }

    /// The receiver half, for the peer's sender.
    pub fn feedback(&self) -> ReceiverFeedback {
        ReceiverFeedback {
            ackno: self
                .header
                .has(flags::ACK)
                .then(|| Wrap32::new(self.header.ack)),
            window_size: self.header.window,
            rst: self.header.has(flags::RST),
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// The length and checksum fields are computed here.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let payload_len = self.payload.len();
        if payload_len > MAX_WIRE_PAYLOAD {
            return Err(PacketError::PayloadTooLong(payload_len));
        }
        let mut buf = vec![0u8; HEADER_LEN + payload_len];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS] = self.header.flags;
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&self.header.window.to_be_bytes());
        buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2]
            .copy_from_slice(&(payload_len as u16).to_be_bytes());
        // Checksum field is zero while computing the checksum.
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        let csum = internet_checksum(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());

        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw byte slice.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }

        let declared = usize::from(read_u16(buf, OFF_PAYLOAD_LEN));
        let actual = buf.len() - HEADER_LEN;
        if declared != actual {
            return Err(PacketError::LengthMismatch { declared, actual });
        }

        let checksum = read_u16(buf, OFF_CHECKSUM);
        let mut scratch = buf.to_vec();
        scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
        if internet_checksum(&scratch) != checksum {
            return Err(PacketError::ChecksumFailed);
        }

        Ok(Packet {
            header: Header {
                seq: read_u32(buf, OFF_SEQ),
                ack: read_u32(buf, OFF_ACK),
                flags: buf[OFF_FLAGS],
                window: read_u16(buf, OFF_WINDOW),
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// The caller must zero any checksum field within `data` first.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
            // Odd trailing byte is padded with zero on the right.
            [hi] => u32::from(*hi) << 8,
            _ => 0,
        })
        .fold(0u32, u32::wrapping_add);

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
