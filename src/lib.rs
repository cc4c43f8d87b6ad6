//! # whisper-archive
//!
//! Consistent-snapshot backup of a Whisper store into a single gzipped tar
//! archive.
//!
//! The source tree is walked for data files (`.wsp` by default). Each file is
//! opened and exclusively locked with `flock(2)` before it is read, appended
//! to the archive under its path relative to the source root, and unlocked
//! right after. Files are processed strictly one at a time, so at most one
//! locked handle is open at any moment.
//!
//! ## Cooperative locking
//!
//! The lock is advisory. It only keeps a file consistent if the process
//! writing to the store takes the same lock before every write. For carbon
//! this means running with `WHISPER_LOCK_WRITES = True` in `carbon.conf`.
//! Writers that ignore the lock can still modify a file while it is being
//! read, and nothing in this crate can detect that.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whisper_archive::{BackupOptions, CancelToken, NoProgress, Result};
//!
//! fn main() -> Result<()> {
//!     let options = BackupOptions::new().level(6)?;
//!     let cancel = CancelToken::new();
//!     let report = whisper_archive::run(
//!         "/var/lib/graphite/whisper",
//!         "/storage/backup/whisper.tar.gz",
//!         &options,
//!         &mut NoProgress,
//!         &cancel,
//!     )?;
//!     println!(
//!         "archived {} files, skipped {}",
//!         report.entries_written,
//!         report.skipped.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Failure policy
//!
//! A file that cannot be opened or locked is logged and skipped; the backup
//! continues with a gap. Everything else (the archive cannot be created, an
//! entry cannot be written, the walk fails, an unclassified lock failure) is
//! returned as an [`Error`] and the archive is abandoned unfinished. It gets no
//! gzip trailer, so decoding it fails instead of yielding a short backup.
//!
//! Cancellation through a [`CancelToken`] is not a failure: the loop stops
//! between files, the archive is finalized with the entries written so far and
//! the returned [`BackupReport`] has `interrupted` set.

pub mod archive;
pub mod backup;
pub mod enumerate;
pub mod error;
pub mod lock;
pub mod options;
pub mod progress;

pub use archive::ArchiveWriter;
pub use backup::{BackupReport, run};
pub use enumerate::{CandidateFile, DEFAULT_SUFFIX, DataFiles};
pub use error::{Error, Result};
pub use lock::{LockOutcome, LockWait, LockedHandle, SkippedFile};
pub use options::BackupOptions;
pub use progress::{BackupProgress, CancelToken, NoProgress, StatisticsProgress};
