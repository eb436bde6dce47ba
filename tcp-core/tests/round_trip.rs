//! Integration tests wiring a bare [`Sender`] to a bare [`Receiver`].
//!
//! No packets or connections are involved: segments and feedback are handed
//! across directly, which lets each test decide exactly what gets lost.

use tcp_core::{
    ByteStream, Reader, Reassembler, Receiver, Segment, Sender, StreamStatus, TcpConfig, Wrap32,
    Writer,
};

/// One direction of a connection: sender side and receiver side.
struct Pipe {
    sender: Sender,
    outbound: ByteStream,
    receiver: Receiver,
    reassembler: Reassembler,
    inbound: ByteStream,
}

impl Pipe {
    fn new(isn: u32, capacity: u64) -> Self {
        let config = TcpConfig::new()
            .with_capacity(capacity)
            .with_initial_rto_ms(1000)
            .with_fixed_isn(Wrap32::new(isn));
        Self {
            sender: Sender::new(&config),
            outbound: ByteStream::new(capacity),
            receiver: Receiver::new(),
            reassembler: Reassembler::new(),
            inbound: ByteStream::new(capacity),
        }
    }

    fn deliver(&mut self, segment: &Segment) {
        self.receiver
            .receive(segment, &mut self.reassembler, &mut self.inbound);
        let feedback = self.receiver.send(&self.inbound);
        self.sender.receive(&feedback);
    }

    /// Push, send, and acknowledge until the sender goes quiet.
    ///
    /// Starts with a window update so space freed by reads is visible.
    fn pump(&mut self) -> usize {
        let mut sent = 0;
        let feedback = self.receiver.send(&self.inbound);
        self.sender.receive(&feedback);
        self.sender.push(&mut self.outbound);
        while let Some(segment) = self.sender.maybe_send() {
            self.deliver(&segment);
            self.sender.push(&mut self.outbound);
            sent += 1;
        }
        sent
    }

    fn drain_inbound(&mut self) -> Vec<u8> {
        let n = self.inbound.bytes_buffered();
        self.inbound.read(n)
    }
}

// ---------------------------------------------------------------------------
// Test 1: "hello" end to end
// ---------------------------------------------------------------------------

#[test]
fn hello_round_trip() {
    let mut pipe = Pipe::new(0, 64_000);
    pipe.outbound.push(b"hello");
    pipe.outbound.close();

    // SYN, then "hello" with FIN.
    assert_eq!(pipe.pump(), 2);
    assert_eq!(pipe.drain_inbound(), b"hello");
    assert!(pipe.inbound.is_finished());
    assert_eq!(pipe.sender.sequence_numbers_in_flight(), 0);
    assert_eq!(
        pipe.receiver.send(&pipe.inbound).ackno,
        Some(Wrap32::new(7))
    );
}

// ---------------------------------------------------------------------------
// Test 2: bulk transfer across the 32-bit wrap with a small window
// ---------------------------------------------------------------------------

#[test]
fn bulk_transfer_wraps_sequence_space() {
    let mut pipe = Pipe::new(u32::MAX - 100, 1000);
    let data: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let mut written = 0;
    let mut received = Vec::new();

    for _ in 0..10_000 {
        if written < data.len() {
            let before = pipe.outbound.bytes_pushed();
            pipe.outbound.push(&data[written..]);
            written += (pipe.outbound.bytes_pushed() - before) as usize;
            if written == data.len() {
                pipe.outbound.close();
            }
        }
        pipe.pump();
        received.extend(pipe.drain_inbound());
        if pipe.inbound.is_finished() {
            break;
        }
        // Recovers the zero-window probe the full receiver dropped.
        pipe.sender.tick(1000);
    }

    assert_eq!(received.len(), data.len());
    assert!(received == data);
    assert_eq!(pipe.reassembler.bytes_pending(), 0);
}

// ---------------------------------------------------------------------------
// Test 3: lost segment recovered by timeout
// ---------------------------------------------------------------------------

#[test]
fn lost_segment_is_retransmitted() {
    let mut pipe = Pipe::new(12345, 64_000);
    pipe.pump(); // handshake
    pipe.outbound.push(b"abc");
    pipe.sender.push(&mut pipe.outbound);

    // First transmission is lost.
    let lost = pipe.sender.maybe_send().unwrap();
    pipe.sender.tick(999);
    assert!(pipe.sender.maybe_send().is_none());
    pipe.sender.tick(1);

    let again = pipe.sender.maybe_send().unwrap();
    assert_eq!(again, lost);
    assert_eq!(pipe.sender.consecutive_retransmissions(), 1);
    assert_eq!(pipe.sender.current_rto_ms(), 2000);

    pipe.deliver(&again);
    assert_eq!(pipe.drain_inbound(), b"abc");
    assert_eq!(pipe.sender.consecutive_retransmissions(), 0);
    assert_eq!(pipe.sender.current_rto_ms(), 1000);
}

// ---------------------------------------------------------------------------
// Test 4: out-of-order and duplicate delivery
// ---------------------------------------------------------------------------

#[test]
fn reordered_and_duplicated_segments() {
    let config = TcpConfig::new()
        .with_max_payload_size(2)
        .with_fixed_isn(Wrap32::new(77));
    let mut pipe = Pipe::new(77, 100);
    pipe.sender = Sender::new(&config);
    pipe.pump();

    pipe.outbound.push(b"abcdef");
    pipe.sender.push(&mut pipe.outbound);
    let segs: Vec<Segment> = std::iter::from_fn(|| pipe.sender.maybe_send()).collect();
    assert_eq!(segs.len(), 3);

    for i in [2, 0, 2, 1, 0] {
        pipe.deliver(&segs[i]);
    }
    assert_eq!(pipe.drain_inbound(), b"abcdef");
    assert_eq!(pipe.sender.sequence_numbers_in_flight(), 0);
}

// ---------------------------------------------------------------------------
// Test 5: zero-window probing
// ---------------------------------------------------------------------------

#[test]
fn zero_window_probe_unblocks_after_read() {
    let mut pipe = Pipe::new(5, 4);
    pipe.pump();
    pipe.outbound.push(b"wxyz");
    pipe.pump();
    assert_eq!(pipe.sender.peer_window(), 0);

    pipe.outbound.push(b"1234");
    pipe.sender.push(&mut pipe.outbound);
    let probe = pipe.sender.maybe_send().unwrap();
    assert_eq!(probe.payload, b"1");
    // Receiver is full: the probe is dropped.
    pipe.deliver(&probe);
    assert_eq!(pipe.inbound.bytes_pushed(), 4);

    pipe.sender.tick(1000);
    assert_eq!(pipe.sender.consecutive_retransmissions(), 0);
    assert_eq!(pipe.drain_inbound(), b"wxyz");

    let retry = pipe.sender.maybe_send().unwrap();
    assert_eq!(retry, probe);
    pipe.deliver(&retry);
    pipe.pump();
    assert_eq!(pipe.drain_inbound(), b"1234");
}
