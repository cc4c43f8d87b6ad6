//! Options for a backup run.

use std::time::Duration;

use crate::enumerate::DEFAULT_SUFFIX;
use crate::lock::LockWait;

/// Options for [`run`](crate::run).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use whisper_archive::{BackupOptions, LockWait};
///
/// let options = BackupOptions::new()
///     .level(6)?
///     .lock_wait(LockWait::Timeout(Duration::from_secs(30)));
/// assert_eq!(options.level, 6);
/// # Ok::<(), whisper_archive::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOptions {
    /// Suffix identifying data files.
    pub suffix: String,
    /// Gzip compression level (0-9).
    pub level: u32,
    /// How long to wait for a contended lock.
    pub lock_wait: LockWait,
    /// Whether the walk descends through symlinked directories.
    pub follow_links: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            level: 9,
            lock_wait: LockWait::Blocking,
            follow_links: false,
        }
    }
}

impl BackupOptions {
    /// Creates options with the defaults: `.wsp` files, gzip level 9,
    /// unbounded lock wait, symlinked directories not followed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data-file suffix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSuffix`](crate::Error::InvalidSuffix) for an
    /// empty suffix, which would match every file.
    pub fn suffix(mut self, suffix: impl Into<String>) -> crate::Result<Self> {
        let suffix = suffix.into();
        if suffix.is_empty() {
            return Err(crate::Error::InvalidSuffix(suffix));
        }
        self.suffix = suffix;
        Ok(self)
    }

    /// Sets the compression level (strict validation).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCompressionLevel`](crate::Error::InvalidCompressionLevel)
    /// if `level` is greater than 9.
    pub fn level(mut self, level: u32) -> crate::Result<Self> {
        if level > 9 {
            return Err(crate::Error::InvalidCompressionLevel { level });
        }
        self.level = level;
        Ok(self)
    }

    /// Sets the compression level, clamping values above 9.
    pub fn level_clamped(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    /// Sets how long to wait for a contended lock.
    pub fn lock_wait(mut self, wait: LockWait) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Shorthand for `lock_wait(LockWait::Timeout(timeout))`.
    pub fn lock_timeout(self, timeout: Duration) -> Self {
        self.lock_wait(LockWait::Timeout(timeout))
    }

    /// Sets whether symlinked directories are followed.
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}
