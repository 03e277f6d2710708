//! Cooperative shutdown flag.
//!
//! A Ctrl-C handler sets a single atomic flag and nothing else; the thread of
//! control observes the flag at loop boundaries (between files on the send
//! side, between accept polls and stream chunks on the receive side) and
//! unwinds normally.  All sockets, files, and buffers are released by scope
//! exit on that path, so the handler never has to touch a resource record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheaply clonable handle to the process-wide shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a flag in the "not requested" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Idempotent.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Has shutdown been requested?
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Register a Ctrl-C handler that sets this flag.
    ///
    /// The handler runs on a dedicated thread; setting the flag is the only
    /// shared-state mutation it performs.
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            log::info!("interrupt received, shutting down");
            flag.request();
        })
    }
}
