//! `tcp-file-transfer` — a minimal whole-file transfer tool over raw TCP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  one connection per file   ┌──────────┐
//!  │  Sender  │───────────────────────────▶│ Receiver │
//!  └────┬─────┘   raw bytes, no framing    └─────┬────┘
//!       │                                        │
//!  reads file into an                      drains stream to
//!  exact-size buffer                       file-NN.dat until EOF
//! ```
//!
//! The wire protocol is "connect, write N raw bytes, close": the stream
//! boundary is the TCP connection itself.  There is no header, length prefix,
//! or acknowledgment.  Both sides are fully synchronous and single-threaded;
//! the sender processes files strictly in order, and the receiver fully
//! services one connection before accepting the next.
//!
//! Each module has a single responsibility:
//! - [`config`]   — port-range validation shared by both modes
//! - [`sender`]   — per-file load/connect/send pipeline
//! - [`receiver`] — accept loop, sequence-numbered output files
//! - [`shutdown`] — cooperative Ctrl-C flag observed at loop boundaries

pub mod config;
pub mod receiver;
pub mod sender;
pub mod shutdown;

pub use config::{validate_port, ConfigError};
pub use receiver::{Outcome, ReceiveError, Receiver};
pub use sender::{send_file, Payload, SendError};
pub use shutdown::Shutdown;
