//! Send side: load a file into memory and stream it over a fresh connection.
//!
//! Each file gets its own TCP connection; connections are strictly sequential,
//! never concurrent.  The per-file pipeline is:
//! 1. Load the whole file into an exact-size [`Payload`] buffer (files at or
//!    above [`MAX_PAYLOAD_BYTES`] are rejected before any socket work).
//! 2. Parse the server address (an unparsable address aborts this file only).
//! 3. Connect, write the entire buffer, then shut down the write half so the
//!    peer sees EOF.
//!
//! Every failure is terminal for the affected file but never for the pass:
//! [`run`] warns and moves on to the next path.  Connection and buffer are
//! released by drop on every path, success or failure.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{IpAddr, Shutdown as SocketShutdown, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shutdown::Shutdown;

/// Ceiling on the in-memory payload buffer: 10 MiB.
///
/// Files at or above this size are skipped; the bound exists only to cap the
/// memory use of the whole-file buffering strategy.
pub const MAX_PAYLOAD_BYTES: u64 = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that abort the transfer of a single file.
#[derive(Debug, Error)]
pub enum SendError {
    /// The file could not be opened or measured.
    #[error("cannot open \"{path}\": {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is at or above the in-memory buffer ceiling.
    #[error("\"{path}\" is {size} bytes, at or above the {MAX_PAYLOAD_BYTES}-byte limit")]
    TooLarge { path: PathBuf, size: u64 },
    /// Fewer bytes were read than the measured file length.
    #[error("short read on \"{path}\": expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    /// The server address did not parse as an IP address.
    #[error("invalid server address \"{0}\"")]
    InvalidAddress(String),
    /// The connection to the server could not be established.
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },
    /// Writing the payload to the connection failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The complete contents of one file, buffered for a single send.
///
/// Exclusively owned by the active transfer and dropped as soon as the send
/// completes or fails.
#[derive(Debug)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    /// Read `path` fully into memory.
    ///
    /// The buffer is allocated to the measured file length; a byte count that
    /// does not match the measured length is reported as [`SendError::ShortRead`].
    pub fn load(path: &Path) -> Result<Self, SendError> {
        let mut file = File::open(path).map_err(|source| SendError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let expected = file
            .metadata()
            .map_err(|source| SendError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        if expected >= MAX_PAYLOAD_BYTES {
            return Err(SendError::TooLarge {
                path: path.to_path_buf(),
                size: expected,
            });
        }

        let mut bytes = Vec::with_capacity(expected as usize);
        file.read_to_end(&mut bytes)
            .map_err(|source| SendError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        if bytes.len() as u64 != expected {
            return Err(SendError::ShortRead {
                path: path.to_path_buf(),
                expected,
                actual: bytes.len() as u64,
            });
        }

        Ok(Self { bytes })
    }

    /// Payload length in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Is the payload empty?  (An empty file is still a valid transfer.)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Send operations
// ---------------------------------------------------------------------------

/// Transfer one file to `server:port` over a fresh connection.
///
/// Returns the number of bytes delivered.  The connection and the payload
/// buffer are released before this function returns, on every path.
pub fn send_file(server: &str, port: u16, path: &Path) -> Result<u64, SendError> {
    let payload = Payload::load(path)?;

    let ip: IpAddr = server
        .parse()
        .map_err(|_| SendError::InvalidAddress(server.to_string()))?;
    let addr = SocketAddr::new(ip, port);

    log::info!("connecting to {addr}...");
    let mut stream =
        TcpStream::connect(addr).map_err(|source| SendError::Connect { addr, source })?;
    log::info!("connected");

    log::info!("sending \"{}\" ({} bytes)...", path.display(), payload.len());
    stream
        .write_all(payload.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(SendError::Send)?;

    // Push the FIN so the peer sees end-of-stream; the close itself is the
    // message boundary in this protocol.
    if let Err(e) = stream.shutdown(SocketShutdown::Write) {
        log::debug!("shutdown after send failed: {e}");
    }
    log::info!("done");

    Ok(payload.len())
}

/// Transfer every path in `paths`, strictly in order.
///
/// Per-file failures are warned about and skipped; the pass continues with
/// the next path.  A shutdown request ends the pass between files.  Returns
/// the number of files delivered.
pub fn run(server: &str, port: u16, paths: &[PathBuf], shutdown: &Shutdown) -> usize {
    let mut delivered = 0;
    for path in paths {
        if shutdown.is_requested() {
            log::info!("shutdown requested, stopping the pass");
            break;
        }
        if !path.exists() {
            log::warn!("file \"{}\" does not exist, skipping", path.display());
            continue;
        }
        match send_file(server, port, path) {
            Ok(_) => delivered += 1,
            Err(e) => log::warn!("skipping \"{}\": {e}", path.display()),
        }
    }
    delivered
}
