//! Lossy in-memory network for deterministic testing.
//!
//! Real networks drop, reorder, duplicate, and corrupt packets.  To exercise
//! the reliability mechanisms without a real network, a [`Simulator`] models
//! one direction of a link.  Every packet is encoded on the way in and
//! decoded on the way out, so the wire codec is exercised too.
//!
//! | Fault       | Description                                            |
//! |-------------|--------------------------------------------------------|
//! | Loss        | Drop a packet with probability `loss_rate`.            |
//! | Corruption  | Flip one random bit with probability `corrupt_rate`.   |
//! | Reordering  | Insert at a random queue position with `reorder_rate`. |
//! | Duplication | Enqueue a second copy with probability `duplicate_rate`. |
//!
//! Corrupted datagrams fail their checksum and are discarded by
//! [`Simulator::recv`], which the connection experiences as loss.
//!
//! All randomness comes from a [`StdRng`] seeded from
//! [`SimulatorConfig::seed`], so a given seed always produces the same run.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::connection::Connection;
use crate::packet::{Packet, PacketError};

/// Configuration for the fault model.
///
/// Probabilities are clamped to `[0.0, 1.0]`; NaN counts as zero.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    pub loss_rate: f64,
    pub reorder_rate: f64,
    pub duplicate_rate: f64,
    pub corrupt_rate: f64,
    pub seed: u64,
}

impl SimulatorConfig {
    /// A transparent link.
    pub fn lossless(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }
}

/// Counters for what the link did to the traffic it carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub reordered: u64,
    pub duplicated: u64,
    pub delivered: u64,
    /// Datagrams that failed to decode at the far end.
    pub rejected: u64,
}

/// One direction of a simulated link.
#[derive(Debug)]
pub struct Simulator {
    loss_rate: f64,
    reorder_rate: f64,
    duplicate_rate: f64,
    corrupt_rate: f64,
    rng: StdRng,
    in_transit: VecDeque<Vec<u8>>,
    stats: LinkStats,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            loss_rate: probability(config.loss_rate),
            reorder_rate: probability(config.reorder_rate),
            duplicate_rate: probability(config.duplicate_rate),
            corrupt_rate: probability(config.corrupt_rate),
            rng: StdRng::seed_from_u64(config.seed),
            in_transit: VecDeque::new(),
            stats: LinkStats::default(),
        }
    }

    /// Put `packet` on the link, subject to the fault model.
    pub fn send(&mut self, packet: &Packet) -> Result<(), PacketError> {
        let mut bytes = packet.encode()?;
        self.stats.sent += 1;

        if self.rng.random_bool(self.loss_rate) {
            self.stats.dropped += 1;
            log::trace!("[sim] dropped seq={}", packet.header.seq);
            return Ok(());
        }

        if self.rng.random_bool(self.corrupt_rate) {
            let idx = self.rng.random_range(0..bytes.len());
            let bit = self.rng.random_range(0..8u32);
            bytes[idx] ^= 1 << bit;
            self.stats.corrupted += 1;
            log::trace!("[sim] corrupted seq={} at byte {}", packet.header.seq, idx);
        }

        if self.rng.random_bool(self.duplicate_rate) {
            self.stats.duplicated += 1;
            self.enqueue(bytes.clone());
        }
        self.enqueue(bytes);
        Ok(())
    }

    /// Take the next datagram off the link.
    ///
    /// Datagrams that fail to decode are counted and skipped.
    pub fn recv(&mut self) -> Option<Packet> {
        while let Some(bytes) = self.in_transit.pop_front() {
            match Packet::decode(&bytes) {
                Ok(packet) => {
                    self.stats.delivered += 1;
                    return Some(packet);
                }
                Err(e) => {
                    self.stats.rejected += 1;
                    log::debug!("[sim] discarding datagram: {e}");
                }
            }
        }
        None
    }

    /// Drain every packet `from` wants to send onto the link.
    pub fn transmit(&mut self, from: &mut Connection) -> Result<usize, PacketError> {
        let mut n = 0;
        while let Some(packet) = from.poll_transmit() {
            self.send(&packet)?;
            n += 1;
        }
        Ok(n)
    }

    /// Hand every packet on the link to `to`.
    pub fn deliver(&mut self, to: &mut Connection) -> usize {
        let mut n = 0;
        while let Some(packet) = self.recv() {
            to.segment_arrives(&packet);
            n += 1;
        }
        n
    }

    /// Datagrams currently on the link.
    pub fn in_transit(&self) -> usize {
        self.in_transit.len()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn enqueue(&mut self, bytes: Vec<u8>) {
        if !self.in_transit.is_empty() && self.rng.random_bool(self.reorder_rate) {
            let pos = self.rng.random_range(0..self.in_transit.len());
            self.in_transit.insert(pos, bytes);
            self.stats.reordered += 1;
        } else {
            self.in_transit.push_back(bytes);
        }
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
