//! `tcp-core`: the reliable-delivery core of a user-space TCP.
//!
//! # Architecture
//!
//! ```text
//!   application                                   application
//!       │ write                                        ▲ read
//!  ┌────▼─────┐   Segment (seqno, SYN, data, FIN)  ┌────┴─────┐
//!  │  Sender  │───────────────────────────────────▶│ Receiver │
//!  └────▲─────┘                                    └────┬─────┘
//!       │        ReceiverFeedback (ackno, window)       │
//!       └───────────────────────────────────────────────┘
//!
//!  Receiver ──▶ Reassembler ──▶ inbound ByteStream
//!  outbound ByteStream ──▶ Sender
//! ```
//!
//! Everything is a synchronous state machine driven by explicit calls.  Time
//! only passes through `tick`.  Nothing here touches a socket.
//!
//! Each module has a single responsibility:
//! - [`wrapping`]: 32-bit wrapping sequence numbers
//! - [`byte_stream`]: capacity-bounded byte pipe with reader/writer halves
//! - [`reassembler`]: out-of-order substring reassembly
//! - [`message`]: segment and feedback value types
//! - [`sender`]: outbound segmentation, windowing, retransmission
//! - [`receiver`]: inbound ISN tracking, ackno and window reporting
//! - [`timer`]: retransmission timer with exponential back-off
//! - [`state`]: observable lifecycle stages
//! - [`config`]: tunables
//! - [`packet`]: wire format (serialise / deserialise)
//! - [`connection`]: one endpoint wiring sender and receiver together
//! - [`simulator`]: lossy/reordering in-memory link for testing

pub mod byte_stream;
pub mod config;
pub mod connection;
pub mod message;
pub mod packet;
pub mod reassembler;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod state;
pub mod timer;
pub mod wrapping;

pub use byte_stream::{ByteStream, Reader, StreamError, StreamStatus, Writer};
pub use config::TcpConfig;
pub use connection::{Connection, ConnectionError};
pub use message::{ReceiverFeedback, Segment};
pub use packet::{Packet, PacketError};
pub use reassembler::Reassembler;
pub use receiver::Receiver;
pub use sender::Sender;
pub use simulator::{Simulator, SimulatorConfig};
pub use wrapping::Wrap32;
