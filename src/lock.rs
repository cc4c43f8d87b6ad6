//! Snapshot lock coordination.
//!
//! Before a data file is read it is opened and exclusively locked with
//! `flock(2)`. The lock is advisory: it only holds off writers that take the
//! same lock before writing (carbon with `WHISPER_LOCK_WRITES = True`).
//!
//! Open and lock failures reported by the operating system (permission
//! denied, file vanished, no locks available, ...) are recoverable: the file is
//! turned into a [`SkippedFile`] and the run moves on. Failures that do not
//! come from the OS, such as a path the platform cannot represent, are
//! returned as [`Error::Lock`] and end the run.

use std::fs::{File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::enumerate::CandidateFile;
use crate::progress::CancelToken;
use crate::{Error, Result};

/// Interval between lock attempts while a file is contended.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for a contended lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockWait {
    /// Wait until the lock is granted or the run is cancelled.
    #[default]
    Blocking,
    /// Give up after the duration and skip the file.
    Timeout(Duration),
}

/// A data file that was left out of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path of the file as reached by the walk.
    pub path: PathBuf,
    /// The entry name the file would have had.
    pub entry_name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of trying to lock one candidate.
#[derive(Debug)]
pub enum LockOutcome {
    /// The file is open and exclusively locked.
    Locked(LockedHandle),
    /// The file could not be opened or locked and should be skipped.
    Skipped(SkippedFile),
}

/// An open read handle holding an exclusive lock on its file.
///
/// The lock is released when the handle is dropped.
#[derive(Debug)]
pub struct LockedHandle {
    file: File,
    path: PathBuf,
}

impl LockedHandle {
    /// Opens `path` for reading and takes an exclusive lock on it.
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires while the lock is
    /// contended. Any other error is the raw open or lock failure wrapped in
    /// [`Error::Lock`]; use [`lock_candidate`] for the skip-or-fail policy.
    pub fn acquire(path: &Path, wait: LockWait, cancel: &CancelToken) -> Result<Self> {
        let lock_error = |source| Error::Lock {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(lock_error)?;
        let started = Instant::now();

        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    if let LockWait::Timeout(limit) = wait {
                        if started.elapsed() >= limit {
                            return Err(lock_error(io::Error::new(
                                io::ErrorKind::TimedOut,
                                format!("lock still held after {limit:?}"),
                            )));
                        }
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(lock_error(e)),
            }
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata of the open handle (`fstat`).
    pub fn metadata(&self) -> io::Result<Metadata> {
        self.file.metadata()
    }

    /// The underlying file, positioned wherever the last read left it.
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Releases the lock and closes the handle.
    pub fn release(self) -> io::Result<()> {
        FileExt::unlock(&self.file)
    }
}

impl Drop for LockedHandle {
    fn drop(&mut self) {
        // Closing the descriptor drops the flock as well; unlocking first
        // keeps the release independent of other descriptors of the file.
        let _ = FileExt::unlock(&self.file);
    }
}

/// Opens and locks a candidate, classifying failures.
///
/// OS-reported failures and lock timeouts become [`LockOutcome::Skipped`].
/// Cancellation is returned as [`Error::Cancelled`]; anything else as
/// [`Error::Lock`].
pub fn lock_candidate(
    candidate: &CandidateFile,
    wait: LockWait,
    cancel: &CancelToken,
) -> Result<LockOutcome> {
    match LockedHandle::acquire(&candidate.path, wait, cancel) {
        Ok(handle) => Ok(LockOutcome::Locked(handle)),
        Err(Error::Lock { path, source }) if is_recoverable(&source) => {
            Ok(LockOutcome::Skipped(SkippedFile {
                path,
                entry_name: candidate.entry_name(),
                reason: source.to_string(),
            }))
        }
        Err(e) => Err(e),
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn is_recoverable(error: &io::Error) -> bool {
    error.raw_os_error().is_some() || error.kind() == io::ErrorKind::TimedOut
}
