//! Error types for backup operations.
//!
//! This module provides the [`Error`] enum covering every way a backup run can
//! fail, along with a convenient [`Result<T>`] type alias.
//!
//! # Recoverable vs. fatal
//!
//! Only one class of failure is recoverable: a single data file that cannot be
//! opened or locked. Those never surface as an [`Error`]; the lock coordinator
//! turns them into a [`SkippedFile`](crate::SkippedFile) and the run goes on.
//! Every variant below ends the run.
//!
//! ```rust
//! use whisper_archive::Error;
//!
//! fn describe(error: &Error) -> &'static str {
//!     match error {
//!         Error::CreateArchive { .. } => "destination is not writable",
//!         Error::AddEntry { .. } | Error::ShortRead { .. } => "archive is damaged",
//!         Error::Cancelled => "interrupted",
//!         _ => "backup failed",
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

/// The error type for backup operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred outside of a more specific context.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source directory does not exist or is not a directory.
    #[error("Invalid source directory {}: {reason}", path.display())]
    InvalidSource {
        /// The rejected source path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The destination archive could not be created.
    ///
    /// Returned before any source file is touched.
    #[error("Cannot create archive file {}: {source}", path.display())]
    CreateArchive {
        /// The destination path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Walking the source tree failed, e.g. a subdirectory is unreadable.
    #[error("Failed to walk source tree: {0}")]
    Traversal(#[from] walkdir::Error),

    /// Locking a data file failed in a way that is not attributable to the
    /// file itself.
    #[error("Unexpected error locking {}: {source}", path.display())]
    Lock {
        /// The data file being locked.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading a data file or writing its entry failed.
    ///
    /// The archive is abandoned unfinished when this is returned.
    #[error("An error occurred archiving file {}: {source}", path.display())]
    AddEntry {
        /// The data file being archived.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A data file yielded fewer bytes than its size when it was locked.
    ///
    /// This happens when a writer that ignores the lock truncates the file
    /// mid-read.
    #[error(
        "Data file {} shrank while being archived: expected {expected} bytes, read {actual}",
        path.display()
    )]
    ShortRead {
        /// The data file being archived.
        path: PathBuf,
        /// Size recorded in the entry header.
        expected: u64,
        /// Bytes actually read.
        actual: u64,
    },

    /// An entry was added to an archive that is not open.
    #[error("Archive is not open")]
    NotOpen,

    /// The archive was already opened once.
    #[error("Archive has already been opened")]
    AlreadyOpened,

    /// The compression level is outside 0-9.
    #[error("Invalid compression level: {level} (valid range: 0-9)")]
    InvalidCompressionLevel {
        /// The rejected level.
        level: u32,
    },

    /// The data-file suffix is empty.
    #[error("Invalid data-file suffix: {0:?}")]
    InvalidSuffix(String),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

/// A specialized Result type for backup operations.
pub type Result<T> = std::result::Result<T, Error>;
