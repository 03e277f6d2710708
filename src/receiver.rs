//! Receive side: accept connections one at a time and persist each stream.
//!
//! The [`Receiver`] owns the listening socket and the process-lifetime
//! [`FileSequence`].  Each accepted connection is serviced fully and
//! synchronously before the next accept: the stream is drained in
//! [`CHUNK_SIZE`] chunks into a freshly created `file-NN.dat` until the peer
//! closes the connection.
//!
//! Failure policy:
//! - A transient accept failure is logged and the loop continues.
//! - A file-creation failure abandons the connection without reading from it.
//! - A mid-stream read or write error deletes the partial output file; the
//!   sequence number it consumed is not reclaimed.
//! - A zero-length read is a clean end of stream; the file is kept.
//!
//! Partial output files are managed by the [`PartialFile`] guard, so deletion
//! happens on every error path without any path re-tracking close-twice or
//! delete-twice.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use thiserror::Error;

use crate::shutdown::Shutdown;

/// Read size for draining a connection.
pub const CHUNK_SIZE: usize = 1024;

/// Pending-connection backlog for the listening socket.
pub const LISTEN_BACKLOG: i32 = 5;

/// Output filename prefix.
const FILE_PREFIX: &str = "file-";

/// Output filename suffix.
const FILE_SUFFIX: &str = ".dat";

/// Poll interval for the nonblocking accept loop.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors on the receive side.
///
/// Only [`ReceiveError::Bind`] and [`ReceiveError::Listen`] are fatal to the
/// process; everything else is terminal for one connection only.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    /// The bound socket could not start listening.
    #[error("failed to listen: {0}")]
    Listen(#[source] std::io::Error),
    /// The listening socket could not be switched to polling mode.
    #[error("cannot poll listener: {0}")]
    Poll(#[source] std::io::Error),
    /// The output file could not be created.
    #[error("unable to create \"{path}\": {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Reading from the connection failed mid-stream.
    #[error("transfer failed: {0}")]
    Stream(#[source] std::io::Error),
    /// Appending to the output file failed.
    #[error("write to \"{path}\" failed: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// FileSequence
// ---------------------------------------------------------------------------

/// Process-lifetime monotone counter naming output files.
///
/// Every accepted connection consumes a number, whether or not its receive
/// completes; numbers are never reused or reset.
#[derive(Debug)]
pub struct FileSequence {
    next: u32,
}

impl FileSequence {
    /// Start the sequence at 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next output path under `dir`, advancing the counter.
    pub fn next_path(&mut self, dir: &Path) -> PathBuf {
        let name = format!("{FILE_PREFIX}{:02}{FILE_SUFFIX}", self.next);
        self.next += 1;
        dir.join(name)
    }
}

impl Default for FileSequence {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// PartialFile
// ---------------------------------------------------------------------------

/// An in-progress output file that is deleted on drop unless committed.
///
/// The file handle is closed before the unlink, and a missing file at unlink
/// time is ignored, so release is safe to reach from any path exactly once.
#[derive(Debug)]
struct PartialFile {
    file: Option<File>,
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn create(path: PathBuf) -> Result<Self, ReceiveError> {
        let file = File::create(&path).map_err(|source| ReceiveError::Create {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            file: Some(file),
            path,
            committed: false,
        })
    }

    fn append(&mut self, chunk: &[u8]) -> Result<(), ReceiveError> {
        self.file
            .as_mut()
            .expect("file handle present until drop")
            .write_all(chunk)
            .map_err(|source| ReceiveError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Keep the file: close it and disarm the drop-time delete.
    fn commit(mut self) -> PathBuf {
        self.committed = true;
        self.file.take();
        self.path.clone()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            // Close before unlink; a file already gone is fine.
            self.file.take();
            let _ = fs::remove_file(&self.path);
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Result of servicing one accepted connection.
#[derive(Debug)]
pub enum Outcome {
    /// The peer closed the stream cleanly; the file is a durable artifact.
    Complete { path: PathBuf, bytes: u64 },
    /// The receive failed; any partial file has been deleted.
    Failed(ReceiveError),
    /// Shutdown was requested mid-stream; the partial file is left as-is.
    Interrupted { path: PathBuf, bytes: u64 },
}

/// One-connection-at-a-time TCP receiver persisting each stream to disk.
#[derive(Debug)]
pub struct Receiver {
    listener: TcpListener,
    sequence: FileSequence,
    output_dir: PathBuf,
}

impl Receiver {
    /// Bind a listening socket on `addr` with a backlog of [`LISTEN_BACKLOG`].
    ///
    /// Port-range validation is the caller's concern; binding port 0 (an
    /// OS-assigned ephemeral port) is allowed here for tests.
    pub fn bind(addr: SocketAddr, output_dir: PathBuf) -> Result<Self, ReceiveError> {
        let domain = Domain::for_address(addr);
        let socket = Socket::new(domain, Type::STREAM, None)
            .and_then(|socket| socket.bind(&addr.into()).map(|()| socket))
            .map_err(|source| ReceiveError::Bind { addr, source })?;
        socket.listen(LISTEN_BACKLOG).map_err(ReceiveError::Listen)?;

        Ok(Self {
            listener: socket.into(),
            sequence: FileSequence::new(),
            output_dir,
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Block until one connection has been accepted and fully serviced.
    ///
    /// Returns `Ok(None)` if shutdown was requested before a connection
    /// arrived.  Transient accept failures are logged and polling continues;
    /// `Err` is reserved for a listener that cannot be polled at all, which
    /// is fatal to the process.
    pub fn accept_one(&mut self, shutdown: &Shutdown) -> Result<Option<Outcome>, ReceiveError> {
        self.listener
            .set_nonblocking(true)
            .map_err(ReceiveError::Poll)?;
        loop {
            if shutdown.is_requested() {
                return Ok(None);
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("connection accepted from {peer}");
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::error!("failed to configure accepted connection: {e}");
                        return Ok(Some(Outcome::Failed(ReceiveError::Stream(e))));
                    }
                    let outcome = self.receive_to_file(stream, shutdown);
                    // The per-connection socket drops here, closing it before
                    // the next accept.
                    log::info!("connection closed");
                    return Ok(Some(outcome));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    log::warn!("failed to accept connection: {e}");
                }
            }
        }
    }

    /// Accept and service connections until shutdown is requested.
    ///
    /// `Ok(())` means a clean shutdown; `Err` is a fatal listener failure
    /// and the caller should exit non-zero.
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<(), ReceiveError> {
        loop {
            match self.accept_one(shutdown)? {
                Some(Outcome::Complete { path, bytes }) => {
                    log::info!("saved \"{}\" ({bytes} bytes)", path.display());
                }
                Some(Outcome::Failed(e)) => log::warn!("{e}"),
                Some(Outcome::Interrupted { path, bytes }) => {
                    log::info!(
                        "interrupted after {bytes} bytes; \"{}\" left incomplete",
                        path.display()
                    );
                }
                None => return Ok(()),
            }
        }
    }

    /// Drain `stream` into the next sequence-numbered file.
    ///
    /// The sequence number is consumed up front, so a failed receive still
    /// advances the counter.
    fn receive_to_file(&mut self, mut stream: TcpStream, shutdown: &Shutdown) -> Outcome {
        let path = self.sequence.next_path(&self.output_dir);

        // On creation failure the connection is abandoned unread; the caller
        // closes the socket.
        let mut output = match PartialFile::create(path) {
            Ok(output) => output,
            Err(e) => return Outcome::Failed(e),
        };

        log::info!("receiving file...");
        let mut buf = [0u8; CHUNK_SIZE];
        let mut received: u64 = 0;
        loop {
            if shutdown.is_requested() {
                // Best-effort stop: the partial artifact stays on disk.
                let bytes = received;
                let path = output.commit();
                return Outcome::Interrupted { path, bytes };
            }
            match stream.read(&mut buf) {
                // Peer closed the connection: the stream boundary.
                Ok(0) => {
                    let bytes = received;
                    let path = output.commit();
                    return Outcome::Complete { path, bytes };
                }
                Ok(n) => {
                    if let Err(e) = output.append(&buf[..n]) {
                        return Outcome::Failed(e);
                    }
                    received += n as u64;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                // A reset mid-stream; the guard deletes the partial file.
                Err(e) => return Outcome::Failed(ReceiveError::Stream(e)),
            }
        }
    }
}
