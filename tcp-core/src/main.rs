//! Entry point for `tcp-sim`.
//!
//! Runs one client/server transfer over a pair of simulated links and checks
//! that every byte arrived intact.  All protocol work is delegated to the
//! library; `main.rs` owns only process setup (logging, argument parsing)
//! and the event loop that moves packets and time.

use anyhow::{bail, Context};
use clap::Parser;

use tcp_core::config::{DEFAULT_CAPACITY, DEFAULT_INITIAL_RTO_MS};
use tcp_core::simulator::LinkStats;
use tcp_core::{Connection, Reader, Simulator, SimulatorConfig, TcpConfig};

/// Transfer bytes between two in-memory TCP endpoints over a lossy link.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of bytes the client sends.
    #[arg(long, default_value_t = 100_000)]
    bytes: usize,
    /// Probability that a packet is dropped.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Probability that a packet overtakes others in flight.
    #[arg(long, default_value_t = 0.0)]
    reorder: f64,
    /// Probability that a packet is delivered twice.
    #[arg(long, default_value_t = 0.0)]
    duplicate: f64,
    /// Probability that a packet has one bit flipped.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,
    /// RNG seed for the fault model.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Byte-stream capacity in each direction.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: u64,
    /// Initial retransmission timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_INITIAL_RTO_MS)]
    rto: u64,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,
    /// Give up after this many ticks.
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: u64,
}

impl Cli {
    fn link(&self, seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            loss_rate: self.loss,
            reorder_rate: self.reorder,
            duplicate_rate: self.duplicate,
            corrupt_rate: self.corrupt,
            seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    log::info!("starting transfer: {cli:?}");

    let config = TcpConfig::new()
        .with_capacity(cli.capacity)
        .with_initial_rto_ms(cli.rto);
    let mut client = Connection::new(config.clone());
    let mut server = Connection::new(config);
    let mut upstream = Simulator::new(cli.link(cli.seed));
    let mut downstream = Simulator::new(cli.link(cli.seed.wrapping_add(1)));

    let payload: Vec<u8> = (0..cli.bytes).map(|i| (i % 251) as u8).collect();
    let mut written = 0;
    let mut received = Vec::with_capacity(cli.bytes);
    let mut buf = vec![0u8; 4096];
    let mut client_closed = false;
    let mut server_closed = false;
    let mut ticks = 0u64;

    client.connect();
    while client.is_active() || server.is_active() {
        if ticks >= cli.max_ticks {
            bail!(
                "transfer incomplete after {ticks} ticks ({} of {} bytes received)",
                received.len(),
                cli.bytes
            );
        }

        if written < payload.len() {
            written += client.write(&payload[written..]);
        }
        if written == payload.len() && !client_closed {
            client.close();
            client_closed = true;
        }

        upstream.transmit(&mut client).context("client transmit")?;
        upstream.deliver(&mut server);

        loop {
            let n = server.read(&mut buf);
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        if server.inbound().is_finished() && !server_closed {
            server.close();
            server_closed = true;
        }

        downstream.transmit(&mut server).context("server transmit")?;
        downstream.deliver(&mut client);

        client.tick(cli.tick_ms).context("client")?;
        server.tick(cli.tick_ms).context("server")?;
        ticks += 1;
    }

    if received != payload {
        bail!(
            "data mismatch: sent {} bytes, received {}",
            payload.len(),
            received.len()
        );
    }

    println!(
        "transferred {} bytes in {} ticks ({} ms simulated)",
        received.len(),
        ticks,
        ticks * cli.tick_ms
    );
    report("client → server", upstream.stats());
    report("server → client", downstream.stats());
    Ok(())
}

fn report(name: &str, s: LinkStats) {
    println!(
        "  {name}: sent={} dropped={} corrupted={} reordered={} duplicated={} delivered={} rejected={}",
        s.sent, s.dropped, s.corrupted, s.reordered, s.duplicated, s.delivered, s.rejected
    );
}
