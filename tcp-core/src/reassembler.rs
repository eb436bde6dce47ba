//! Out-of-order reassembly into a [`ByteStream`](crate::byte_stream::ByteStream).
//!
//! Substrings arrive tagged with their absolute stream offset, in any order,
//! possibly duplicated or overlapping.  The [`Reassembler`] writes every byte
//! to the output as soon as all earlier bytes are known, and holds the rest
//! in a set of non-overlapping pending spans.
//!
//! Memory is bounded by the output's free space: a byte whose index is at or
//! beyond `next_index + output.available_capacity()` could never be written
//! even if every gap were filled, so it is dropped on arrival.

use std::collections::BTreeMap;

use crate::byte_stream::Writer;

/// Reorders indexed substrings into a contiguous stream.
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Index of the first byte not yet written to the output.
    next_index: u64,

    /// Early data keyed by absolute start index.
    ///
    /// Every key is `> next_index` once an insert returns, and no two spans
    /// overlap or touch.
    pending: BTreeMap<u64, Vec<u8>>,

    /// Sum of the lengths in `pending`.
    pending_bytes: u64,

    /// One past the final byte, once the last substring has been seen.
    end_index: Option<u64>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reassembler whose output has already received `next_index` bytes.
    #[cfg(test)]
    pub(crate) fn resume_at(next_index: u64) -> Self {
        Self {
            next_index,
            ..Self::default()
        }
    }

    /// Insert `data`, whose first byte sits at stream offset `first_index`.
    ///
    /// `is_last` marks the substring that ends the stream; the output is
    /// closed once every byte before that end has been written.
    pub fn insert<W: Writer + ?Sized>(
        &mut self,
        first_index: u64,
        data: &[u8],
        is_last: bool,
        output: &mut W,
    ) {
        let data_end = first_index + data.len() as u64;
        if is_last {
            // Tolerate duplicate last-substring notifications.
            self.end_index = Some(self.end_index.map_or(data_end, |end| end.max(data_end)));
        }

        // Clip to [next_index, next_index + available capacity).
        let window_end = self.next_index + output.available_capacity();
        let start = first_index.max(self.next_index);
        let end = data_end.min(window_end);

        if start < end {
            let chunk = &data[(start - first_index) as usize..(end - first_index) as usize];
            if start == self.next_index {
                self.write(chunk, output);
                self.flush_pending(output);
            } else {
                self.store(start, chunk.to_vec());
            }
        } else if !data.is_empty() {
            log::trace!(
                "[reassembler] discarded {} bytes at {} outside [{}, {})",
                data.len(),
                first_index,
                self.next_index,
                window_end
            );
        }

        if self.end_index.is_some_and(|end| self.next_index >= end) {
            output.close();
        }
    }

    /// Bytes held in pending spans (not yet written to the output).
    pub fn bytes_pending(&self) -> u64 {
        self.pending_bytes
    }

    /// Index of the first byte the output is still waiting for.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    fn write<W: Writer + ?Sized>(&mut self, chunk: &[u8], output: &mut W) {
        let before = output.bytes_pushed();
        output.push(chunk);
        self.next_index += output.bytes_pushed() - before;
    }

    /// Write pending spans that the output has caught up with.
    ///
    /// Each iteration removes one span, so this always terminates.
    fn flush_pending<W: Writer + ?Sized>(&mut self, output: &mut W) {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() > self.next_index {
                break;
            }
            let (start, bytes) = entry.remove_entry();
            self.pending_bytes -= bytes.len() as u64;

            let span_end = start + bytes.len() as u64;
            if span_end > self.next_index {
                let skip = (self.next_index - start) as usize;
                self.write(&bytes[skip..], output);
            }
        }
    }

    /// Merge `[start, start + bytes.len())` into the pending set.
    ///
    /// On overlap the earlier-starting span keeps its bytes and only the part
    /// of the later span past its end is appended.
    fn store(&mut self, mut start: u64, mut bytes: Vec<u8>) {
        // A predecessor that overlaps or touches the new span absorbs it.
        let predecessor = self
            .pending
            .range(..=start)
            .next_back()
            .map(|(&s, b)| (s, s + b.len() as u64));
        if let Some((prev_start, prev_end)) = predecessor {
            if prev_end >= start {
                if let Some(mut merged) = self.pending.remove(&prev_start) {
                    self.pending_bytes -= merged.len() as u64;
                    let new_end = start + bytes.len() as u64;
                    if new_end > prev_end {
                        merged.extend_from_slice(&bytes[(prev_end - start) as usize..]);
                    }
                    start = prev_start;
                    bytes = merged;
                }
            }
        }

        // Swallow every successor that starts at or before our end.
        loop {
            let end = start + bytes.len() as u64;
            let next = self.pending.range(start..=end).next().map(|(&s, _)| s);
            let Some(next_start) = next else { break };
            let Some(next_bytes) = self.pending.remove(&next_start) else {
                break;
            };
            self.pending_bytes -= next_bytes.len() as u64;
            let next_end = next_start + next_bytes.len() as u64;
            if next_end > end {
                bytes.extend_from_slice(&next_bytes[(end - next_start) as usize..]);
            }
        }

        self.pending_bytes += bytes.len() as u64;
        self.pending.insert(start, bytes);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_stream::{ByteStream, Reader, StreamStatus};

    fn setup(capacity: u64) -> (Reassembler, ByteStream) {
        (Reassembler::new(), ByteStream::new(capacity))
    }

    fn drain(s: &mut ByteStream) -> Vec<u8> {
        let n = s.bytes_buffered();
        s.read(n)
    }

    #[test]
    fn in_order_inserts_go_straight_through() {
        let (mut r, mut out) = setup(64);
        r.insert(0, b"abcd", false, &mut out);
        r.insert(4, b"efgh", false, &mut out);
        assert_eq!(drain(&mut out), b"abcdefgh");
        assert_eq!(r.bytes_pending(), 0);
        assert_eq!(r.next_index(), 8);
    }

    #[test]
    fn overlapping_insert_is_merged() {
        let (mut r, mut out) = setup(4);
        r.insert(0, b"ab", false, &mut out);
        r.insert(1, b"bcd", false, &mut out);
        assert_eq!(out.bytes_pushed(), 4);
        assert_eq!(drain(&mut out), b"abcd");
        assert_eq!(r.bytes_pending(), 0);
    }

    #[test]
    fn capacity_bounds_written_and_pending() {
        let (mut r, mut out) = setup(2);
        r.insert(0, b"abcdef", false, &mut out);
        assert_eq!(drain(&mut out), b"ab");
        assert_eq!(r.bytes_pending(), 0);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let (mut r, mut out) = setup(64);
        r.insert(3, b"def", false, &mut out);
        r.insert(3, b"def", false, &mut out);
        assert_eq!(r.bytes_pending(), 3);
        r.insert(0, b"abc", false, &mut out);
        r.insert(0, b"abc", false, &mut out);
        assert_eq!(drain(&mut out), b"abcdef");
        assert_eq!(r.bytes_pending(), 0);
    }

    #[test]
    fn out_of_order_spans_are_held_until_gap_fills() {
        let (mut r, mut out) = setup(64);
        r.insert(2, b"cd", false, &mut out);
        r.insert(6, b"gh", false, &mut out);
        assert_eq!(out.bytes_pushed(), 0);
        assert_eq!(r.bytes_pending(), 4);

        r.insert(0, b"ab", false, &mut out);
        assert_eq!(drain(&mut out), b"abcd");
        assert_eq!(r.bytes_pending(), 2);

        r.insert(4, b"ef", true, &mut out);
        assert_eq!(drain(&mut out), b"efgh");
        assert_eq!(r.bytes_pending(), 0);
        assert!(out.is_finished());
    }

    #[test]
    fn adjacent_and_overlapping_pending_spans_coalesce() {
        let (mut r, mut out) = setup(64);
        r.insert(5, b"fg", false, &mut out);
        r.insert(2, b"cde", false, &mut out); // touches [5, 7)
        assert_eq!(r.bytes_pending(), 5);
        r.insert(3, b"dXfgh", false, &mut out); // overlaps both, extends to 8
        assert_eq!(r.bytes_pending(), 6);
        r.insert(10, b"k", false, &mut out);
        r.insert(1, b"bcdefghijk", false, &mut out); // covers everything
        assert_eq!(r.bytes_pending(), 10);

        r.insert(0, b"a", false, &mut out);
        // Earlier-starting span wins: the stray 'X' never appears.
        assert_eq!(drain(&mut out), b"abcdefghijk");
        assert_eq!(r.bytes_pending(), 0);
    }

    #[test]
    fn stale_bytes_are_trimmed() {
        let (mut r, mut out) = setup(64);
        r.insert(0, b"abc", false, &mut out);
        r.insert(1, b"bcdef", false, &mut out);
        r.insert(0, b"a", false, &mut out);
        assert_eq!(drain(&mut out), b"abcdef");
    }

    #[test]
    fn bytes_beyond_window_are_dropped_then_accepted_after_read() {
        let (mut r, mut out) = setup(4);
        r.insert(2, b"cdefgh", false, &mut out);
        // Window is [0, 4): only "cd" can be held.
        assert_eq!(r.bytes_pending(), 2);
        r.insert(0, b"ab", false, &mut out);
        assert_eq!(drain(&mut out), b"abcd");

        r.insert(4, b"efgh", true, &mut out);
        assert_eq!(drain(&mut out), b"efgh");
        assert!(out.is_finished());
    }

    #[test]
    fn far_future_data_is_ignored() {
        let (mut r, mut out) = setup(8);
        r.insert(100, b"zzz", false, &mut out);
        assert_eq!(r.bytes_pending(), 0);
    }

    #[test]
    fn empty_last_substring_closes_when_caught_up() {
        let (mut r, mut out) = setup(8);
        r.insert(3, b"", true, &mut out);
        assert!(!out.is_closed());
        r.insert(0, b"abc", false, &mut out);
        assert!(out.is_closed());
        assert_eq!(drain(&mut out), b"abc");
    }

    #[test]
    fn last_substring_beyond_capacity_delays_close() {
        let (mut r, mut out) = setup(2);
        r.insert(0, b"abcd", true, &mut out);
        assert!(!out.is_closed());
        assert_eq!(drain(&mut out), b"ab");
        r.insert(2, b"cd", false, &mut out);
        assert!(out.is_closed());
        assert_eq!(drain(&mut out), b"cd");
    }
}
