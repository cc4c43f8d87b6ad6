//! Progress reporting and cancellation for backup runs.
//!
//! [`BackupProgress`] receives per-file callbacks from [`run`](crate::run).
//! [`CancelToken`] is the channel an interrupt handler uses to stop the run;
//! it is checked between files and while waiting for a contended lock.
//!
//! # Example
//!
//! ```rust
//! use whisper_archive::{BackupProgress, CancelToken};
//!
//! struct Printer;
//!
//! impl BackupProgress for Printer {
//!     fn on_entry_complete(&mut self, entry_name: &str, bytes: u64) {
//!         println!("{entry_name}: {bytes} bytes");
//!     }
//! }
//!
//! let cancel = CancelToken::new();
//! let for_handler = cancel.clone();
//! for_handler.cancel();
//! assert!(cancel.is_cancelled());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::lock::SkippedFile;

/// Per-file callbacks for a backup run.
///
/// All methods have no-op defaults.
pub trait BackupProgress {
    /// Called after a file is locked, before its entry is written.
    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        let _ = (entry_name, size);
    }

    /// Called after an entry has been written and its lock released.
    fn on_entry_complete(&mut self, entry_name: &str, bytes: u64) {
        let _ = (entry_name, bytes);
    }

    /// Called when a file is skipped because it could not be opened or locked.
    fn on_skip(&mut self, skipped: &SkippedFile) {
        let _ = skipped;
    }

    /// Checks if the run should stop before the next file.
    ///
    /// Default implementation returns `false` (no cancellation).
    fn should_cancel(&self) -> bool {
        false
    }
}

/// A progress reporter that does nothing (null object pattern).
#[derive(Debug, Default, Clone)]
pub struct NoProgress;

impl BackupProgress for NoProgress {}

/// A progress reporter that collects statistics.
///
/// It never requests cancellation; pair it with a [`CancelToken`] to stop a
/// run.
#[derive(Debug, Default, Clone)]
pub struct StatisticsProgress {
    /// Entry currently being written.
    pub current_entry: Option<String>,
    /// Entries written so far, in order.
    pub completed: Vec<String>,
    /// Bytes of file content written so far.
    pub bytes: u64,
    /// Entry names of skipped files.
    pub skipped: Vec<String>,
}

impl StatisticsProgress {
    /// Creates a new statistics progress reporter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackupProgress for StatisticsProgress {
    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        self.current_entry = Some(entry_name.to_string());
    }

    fn on_entry_complete(&mut self, entry_name: &str, bytes: u64) {
        self.completed.push(entry_name.to_string());
        self.bytes += bytes;
        self.current_entry = None;
    }

    fn on_skip(&mut self, skipped: &SkippedFile) {
        self.skipped.push(skipped.entry_name.clone());
    }
}

/// Shared cancellation flag.
///
/// Clones share the same flag, so one clone can be moved into a signal handler
/// while the run holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
