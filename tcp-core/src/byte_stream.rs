//! Capacity-bounded in-memory byte pipe.
//!
//! A [`ByteStream`] is written on one side and read on the other.  The two
//! roles are exposed as separate capability traits so that each component
//! only sees the half it needs:
//! - [`Writer`]: push bytes, close, flag an error.
//! - [`Reader`]: peek, pop, detect end of stream.
//!
//! Both extend [`StreamStatus`], the read-only counters and flags that every
//! holder may inspect.
//!
//! Writes never grow the buffer: [`Writer::push`] accepts at most
//! [`StreamStatus::available_capacity`] bytes and drops the rest.  That is
//! flow control, not failure.

use std::collections::VecDeque;

use thiserror::Error;

/// Misuse of the reading side of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// [`Reader::pop`] was asked for more bytes than are buffered.
    #[error("cannot pop {requested} bytes: only {buffered} buffered")]
    PopBeyondBuffered { requested: u64, buffered: u64 },
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Counters and flags shared by both ends of a stream.
pub trait StreamStatus {
    /// Total bytes accepted by [`Writer::push`] so far.
    fn bytes_pushed(&self) -> u64;
    /// Total bytes discarded by [`Reader::pop`] so far.
    fn bytes_popped(&self) -> u64;
    /// `true` once [`Writer::close`] has been called.
    fn is_closed(&self) -> bool;
    /// `true` once [`Writer::set_error`] has been called.
    fn has_error(&self) -> bool;
    /// How many more bytes [`Writer::push`] would accept right now.
    fn available_capacity(&self) -> u64;

    /// Bytes pushed but not yet popped.
    fn bytes_buffered(&self) -> u64 {
        self.bytes_pushed() - self.bytes_popped()
    }
}

/// The producing end of a stream.
pub trait Writer: StreamStatus {
    /// Append as much of `data` as fits; the excess is dropped.
    fn push(&mut self, data: &[u8]);
    /// Signal that no further bytes will be pushed.
    fn close(&mut self);
    /// Mark the stream as having suffered an unrecoverable fault.
    fn set_error(&mut self);
}

/// The consuming end of a stream.
pub trait Reader: StreamStatus {
    /// The next contiguous run of unread bytes, without consuming them.
    ///
    /// May return fewer than [`StreamStatus::bytes_buffered`] bytes; call
    /// again after [`Reader::pop`] to see the remainder.
    fn peek(&self) -> &[u8];

    /// Discard the first `len` buffered bytes.
    ///
    /// Asking for more than is buffered is a caller bug and is rejected
    /// without consuming anything.
    fn pop(&mut self, len: u64) -> Result<(), StreamError>;

    /// `true` when the stream is closed and every byte has been popped.
    fn is_finished(&self) -> bool {
        self.is_closed() && self.bytes_buffered() == 0
    }

    /// Peek and pop up to `len` bytes into an owned buffer.
    fn read(&mut self, len: u64) -> Vec<u8> {
        let wanted = len.min(self.bytes_buffered());
        let mut out = Vec::with_capacity(wanted as usize);
        while (out.len() as u64) < wanted {
            let take = {
                let chunk = self.peek();
                let take = chunk.len().min((wanted - out.len() as u64) as usize);
                out.extend_from_slice(&chunk[..take]);
                take
            };
            if take == 0 || self.pop(take as u64).is_err() {
                break;
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ByteStream
// ---------------------------------------------------------------------------

/// A fixed-capacity FIFO byte buffer.
///
/// Invariant: `bytes_buffered() == bytes_pushed() - bytes_popped() <= capacity`.
#[derive(Debug, Clone)]
pub struct ByteStream {
    capacity: u64,
    buffer: VecDeque<u8>,
    pushed: u64,
    popped: u64,
    closed: bool,
    errored: bool,
}

impl ByteStream {
    /// Create an empty stream that will never hold more than `capacity` bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            buffer: VecDeque::new(),
            pushed: 0,
            popped: 0,
            closed: false,
            errored: false,
        }
    }
}

impl StreamStatus for ByteStream {
    fn bytes_pushed(&self) -> u64 {
        self.pushed
    }

    fn bytes_popped(&self) -> u64 {
        self.popped
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn has_error(&self) -> bool {
        self.errored
    }

    fn available_capacity(&self) -> u64 {
        self.capacity - self.bytes_buffered()
    }
}

impl Writer for ByteStream {
    fn push(&mut self, data: &[u8]) {
        if self.closed {
            log::trace!("[stream] push of {} bytes after close ignored", data.len());
            return;
        }
        let len = (data.len() as u64).min(self.available_capacity()) as usize;
        self.buffer.extend(&data[..len]);
        self.pushed += len as u64;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn set_error(&mut self) {
        self.errored = true;
    }
}

impl Reader for ByteStream {
    fn peek(&self) -> &[u8] {
        // The front slice is only empty when the whole deque is.
        self.buffer.as_slices().0
    }

    fn pop(&mut self, len: u64) -> Result<(), StreamError> {
        let buffered = self.bytes_buffered();
        if len > buffered {
            return Err(StreamError::PopBeyondBuffered {
                requested: len,
                buffered,
            });
        }
        self.buffer.drain(..len as usize);
        self.popped += len;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
