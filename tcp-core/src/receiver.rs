//! Inbound half of a connection.
//!
//! The [`Receiver`] is responsible for everything between a decoded
//! [`Segment`] and the inbound [`ByteStream`](crate::byte_stream::ByteStream):
//! - Latching the peer's ISN from the first SYN.
//! - Translating 32-bit sequence numbers into stream indices.
//! - Handing payloads to the [`Reassembler`].
//! - Reporting the ackno and window the peer's sender needs.
//!
//! The [`Receiver`] does **not** send anything itself; [`Receiver::send`]
//! produces the feedback that [`crate::connection::Connection`] stamps onto
//! outgoing packets.

use crate::byte_stream::{StreamStatus, Writer};
use crate::message::{ReceiverFeedback, Segment};
use crate::reassembler::Reassembler;
use crate::state::ReceiverState;
use crate::wrapping::Wrap32;

/// Receive-side state for one connection.
#[derive(Debug, Default)]
pub struct Receiver {
    /// Peer's initial sequence number, once its SYN has arrived.
    isn: Option<Wrap32>,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one inbound segment.
    pub fn receive<W: Writer + ?Sized>(
        &mut self,
        segment: &Segment,
        reassembler: &mut Reassembler,
        inbound: &mut W,
    ) {
        if segment.rst {
            log::debug!("[receiver] RST received, flagging inbound stream");
            inbound.set_error();
            return;
        }

        let isn = match self.isn {
            Some(isn) => isn,
            None if segment.syn => {
                log::debug!("[receiver] SYN received, isn={}", segment.seqno);
                self.isn = Some(segment.seqno);
                segment.seqno
            }
            None => {
                log::trace!("[receiver] dropping seq={} before SYN", segment.seqno);
                return;
            }
        };

        // The next byte we expect sits at absolute seqno bytes_pushed + 1.
        let checkpoint = inbound.bytes_pushed() + 1;
        let abs_seqno = segment.seqno.unwrap(isn, checkpoint);
        let payload_abs = abs_seqno + u64::from(segment.syn);
        if payload_abs == 0 {
            // Only a SYN may occupy absolute seqno 0.
            log::trace!("[receiver] dropping non-SYN segment at the ISN");
            return;
        }

        reassembler.insert(payload_abs - 1, &segment.payload, segment.fin, inbound);
    }

    /// Acknowledgment and window to advertise to the peer's sender.
    pub fn send<S: StreamStatus + ?Sized>(&self, inbound: &S) -> ReceiverFeedback {
        let ackno = self.isn.map(|isn| {
            let abs = inbound.bytes_pushed() + 1 + u64::from(inbound.is_closed());
            Wrap32::wrap(abs, isn)
        });
        ReceiverFeedback {
            ackno,
            window_size: inbound.available_capacity().min(u64::from(u16::MAX)) as u16,
            rst: inbound.has_error(),
        }
    }

    /// Peer's ISN, if a SYN has been seen.
    pub fn isn(&self) -> Option<Wrap32> {
        self.isn
    }

    pub fn state<S: StreamStatus + ?Sized>(&self, inbound: &S) -> ReceiverState {
        if inbound.has_error() {
            ReceiverState::Error
        } else if self.isn.is_none() {
            ReceiverState::Listen
        } else if inbound.is_closed() {
            ReceiverState::FinReceived
        } else {
            ReceiverState::SynReceived
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_stream::{ByteStream, Reader};

    const ISN: u32 = 0xFFFF_FFFE;

    struct Harness {
        receiver: Receiver,
        reassembler: Reassembler,
        inbound: ByteStream,
    }

    impl Harness {
        fn new(capacity: u64) -> Self {
            Self {
                receiver: Receiver::new(),
                reassembler: Reassembler::new(),
                inbound: ByteStream::new(capacity),
            }
        }

        fn segment(&mut self, seg: Segment) {
            self.receiver
                .receive(&seg, &mut self.reassembler, &mut self.inbound);
        }

        fn feedback(&self) -> ReceiverFeedback {
            self.receiver.send(&self.inbound)
        }
    }

    fn seg(offset: u64, payload: &[u8]) -> Segment {
        Segment {
            seqno: Wrap32::wrap(offset, Wrap32::new(ISN)),
            payload: payload.to_vec(),
            ..Default::default()
        }
    }

    fn syn() -> Segment {
        Segment {
            syn: true,
            ..seg(0, b"")
        }
    }

    fn ackno(offset: u64) -> Option<Wrap32> {
        Some(Wrap32::wrap(offset, Wrap32::new(ISN)))
    }

    #[test]
    fn no_ackno_before_syn() {
        let mut h = Harness::new(100);
        h.segment(seg(1, b"early"));
        assert_eq!(h.inbound.bytes_pushed(), 0);
        let fb = h.feedback();
        assert_eq!(fb.ackno, None);
        assert_eq!(fb.window_size, 100);
        assert_eq!(h.receiver.state(&h.inbound), ReceiverState::Listen);
    }

    #[test]
    fn syn_then_data_across_wrap() {
        let mut h = Harness::new(100);
        h.segment(syn());
        assert_eq!(h.feedback().ackno, ackno(1));
        assert_eq!(h.receiver.state(&h.inbound), ReceiverState::SynReceived);

        // ISN is two below the wrap, so offsets 2.. have wrapped raw values.
        h.segment(seg(1, b"hello"));
        assert_eq!(h.feedback().ackno, ackno(6));
        assert_eq!(h.feedback().ackno.map(Wrap32::raw_value), Some(4));
        assert_eq!(h.inbound.read(5), b"hello");
    }

    #[test]
    fn syn_carrying_payload_and_fin() {
        let mut h = Harness::new(100);
        h.segment(Segment {
            syn: true,
            fin: true,
            ..seg(0, b"hi")
        });
        assert_eq!(h.inbound.peek(), b"hi");
        assert!(h.inbound.is_closed());
        // SYN + 2 bytes + FIN.
        assert_eq!(h.feedback().ackno, ackno(4));
        assert_eq!(h.receiver.state(&h.inbound), ReceiverState::FinReceived);
    }

    #[test]
    fn out_of_order_segment_is_held() {
        let mut h = Harness::new(100);
        h.segment(syn());
        h.segment(seg(4, b"def"));
        assert_eq!(h.feedback().ackno, ackno(1));
        h.segment(seg(1, b"abc"));
        assert_eq!(h.feedback().ackno, ackno(7));
        assert_eq!(h.inbound.read(6), b"abcdef");
    }

    #[test]
    fn fin_counts_only_once_stream_closes() {
        let mut h = Harness::new(100);
        h.segment(syn());
        h.segment(Segment {
            fin: true,
            ..seg(3, b"c")
        });
        assert_eq!(h.feedback().ackno, ackno(1));
        h.segment(seg(1, b"ab"));
        assert_eq!(h.feedback().ackno, ackno(5));
        assert!(h.inbound.is_closed());
    }

    #[test]
    fn window_tracks_capacity_and_saturates() {
        let mut h = Harness::new(10);
        h.segment(syn());
        h.segment(seg(1, b"abcd"));
        assert_eq!(h.feedback().window_size, 6);

        let big = Harness::new(1 << 20);
        assert_eq!(big.feedback().window_size, u16::MAX);
    }

    #[test]
    fn data_at_isn_without_syn_is_dropped() {
        let mut h = Harness::new(100);
        h.segment(syn());
        h.segment(seg(0, b"bogus"));
        assert_eq!(h.inbound.bytes_pushed(), 0);
        assert_eq!(h.feedback().ackno, ackno(1));
    }

    #[test]
    fn rst_flags_error() {
        let mut h = Harness::new(100);
        h.segment(Segment {
            rst: true,
            ..seg(0, b"")
        });
        assert!(h.inbound.has_error());
        let fb = h.feedback();
        assert!(fb.rst);
        assert_eq!(h.receiver.state(&h.inbound), ReceiverState::Error);
    }

    /// A stream that has already carried `base` bytes before this test.
    struct Resumed {
        base: u64,
        inner: ByteStream,
    }

    impl StreamStatus for Resumed {
        fn bytes_pushed(&self) -> u64 {
            self.base + self.inner.bytes_pushed()
        }
        fn bytes_popped(&self) -> u64 {
            self.base + self.inner.bytes_popped()
        }
        fn is_closed(&self) -> bool {
            self.inner.is_closed()
        }
        fn has_error(&self) -> bool {
            self.inner.has_error()
        }
        fn available_capacity(&self) -> u64 {
            self.inner.available_capacity()
        }
    }

    impl Writer for Resumed {
        fn push(&mut self, data: &[u8]) {
            self.inner.push(data);
        }
        fn close(&mut self) {
            self.inner.close();
        }
        fn set_error(&mut self) {
            self.inner.set_error();
        }
    }

    #[test]
    fn stream_offsets_past_four_gigabytes() {
        let base = (1u64 << 32) - 2;
        let mut receiver = Receiver::new();
        let mut reassembler = Reassembler::resume_at(base);
        let mut inbound = Resumed {
            base,
            inner: ByteStream::new(100),
        };

        receiver.receive(&syn(), &mut reassembler, &mut inbound);
        assert_eq!(receiver.send(&inbound).ackno, ackno(base + 1));

        // Stream index `base` is absolute seqno `base + 1`.
        receiver.receive(&seg(base + 4, b"ld"), &mut reassembler, &mut inbound);
        assert_eq!(reassembler.bytes_pending(), 2);
        receiver.receive(&seg(base + 1, b"wor"), &mut reassembler, &mut inbound);

        assert_eq!(reassembler.next_index(), base + 5);
        assert_eq!(inbound.bytes_pushed(), (1u64 << 32) + 3);
        assert_eq!(inbound.inner.read(5), b"world");
        let fb = receiver.send(&inbound);
        assert_eq!(fb.ackno, ackno(base + 6));
        // (2^32 + 4) + ISN, modulo 2^32.
        assert_eq!(fb.ackno.map(Wrap32::raw_value), Some(2));
    }

    #[test]
    fn data_beyond_window_is_discarded() {
        let mut h = Harness::new(4);
        h.segment(syn());
        h.segment(seg(1, b"abcdefgh"));
        assert_eq!(h.inbound.bytes_pushed(), 4);
        assert_eq!(h.feedback().window_size, 0);
        assert_eq!(h.feedback().ackno, ackno(5));
    }
}
