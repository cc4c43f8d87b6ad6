//! The gzipped tar container.
//!
//! [`ArchiveWriter`] moves through `Unopened → Open → Closed`. Entries can only
//! be added while open, and [`ArchiveWriter::close`] is a no-op in every other
//! state, so it can be called from both the normal completion path and an
//! interrupt path.
//!
//! A failed [`ArchiveWriter::add_entry`] abandons the writer, and so does
//! dropping a writer that is still open. An abandoned archive is left as it
//! is: no end-of-archive blocks and no gzip trailer are written, so readers
//! see a truncated stream rather than a complete backup.

use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, Header, HeaderMode};

use crate::lock::LockedHandle;
use crate::{Error, Result};

type Encoder = GzEncoder<BufWriter<ArchiveFile>>;

/// The output file, which refuses every write once the archive is abandoned.
///
/// `tar::Builder` and `GzEncoder` finish themselves when dropped; with the
/// file fenced off those final writes fail and are discarded.
struct ArchiveFile {
    file: File,
    abandoned: Arc<AtomicBool>,
}

impl ArchiveFile {
    fn check(&self) -> io::Result<()> {
        if self.abandoned.load(Ordering::SeqCst) {
            return Err(io::Error::other("archive was abandoned"));
        }
        Ok(())
    }
}

impl Write for ArchiveFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        self.file.flush()
    }
}

/// Lifecycle state of the writer.
enum WriterState {
    /// Not created on disk yet.
    Unopened,
    /// Accepting entries.
    Open(Box<Builder<Encoder>>),
    /// Finalized, or given up after a failed entry.
    Closed,
}

impl WriterState {
    fn name(&self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Open(_) => "open",
            Self::Closed => "closed",
        }
    }
}

/// Writer for the single output archive of a backup run.
pub struct ArchiveWriter {
    path: PathBuf,
    level: u32,
    state: WriterState,
    entries_written: usize,
    bytes_written: u64,
    abandoned: Arc<AtomicBool>,
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("state", &self.state.name())
            .field("entries_written", &self.entries_written)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

impl ArchiveWriter {
    /// Prepares a writer for `path` without touching the filesystem.
    ///
    /// `level` is the gzip level; values above 9 are clamped.
    pub fn new(path: impl Into<PathBuf>, level: u32) -> Self {
        Self {
            path: path.into(),
            level: level.min(9),
            state: WriterState::Unopened,
            entries_written: 0,
            bytes_written: 0,
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates the archive file at `path` and returns an open writer.
    pub fn create(path: impl Into<PathBuf>, level: u32) -> Result<Self> {
        let mut writer = Self::new(path, level);
        writer.open()?;
        Ok(writer)
    }

    /// Creates (or truncates) the archive file.
    pub fn open(&mut self) -> Result<()> {
        if !matches!(self.state, WriterState::Unopened) {
            return Err(Error::AlreadyOpened);
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| Error::CreateArchive {
                path: self.path.clone(),
                source,
            })?;

        let output = ArchiveFile {
            file,
            abandoned: Arc::clone(&self.abandoned),
        };
        let encoder = GzEncoder::new(BufWriter::new(output), Compression::new(self.level));
        let mut builder = Builder::new(encoder);
        builder.mode(HeaderMode::Complete);
        self.state = WriterState::Open(Box::new(builder));
        Ok(())
    }

    /// Appends the full content of a locked file as one entry.
    ///
    /// The header takes size, mtime, mode, uid and gid from the handle's
    /// `fstat`. Exactly that many bytes are copied; bytes appended after the
    /// lock was taken are ignored and a file that shrinks fails with
    /// [`Error::ShortRead`]. Any error abandons the writer.
    ///
    /// Returns the number of content bytes written.
    pub fn add_entry(&mut self, handle: &mut LockedHandle, name: &Path) -> Result<u64> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        let meta = match handle.metadata() {
            Ok(meta) => meta,
            Err(source) => {
                self.abandon();
                return Err(Error::AddEntry {
                    path: handle.path().to_path_buf(),
                    source,
                });
            }
        };
        self.add_entry_with_metadata(handle, &meta, name)
    }

    /// Like [`ArchiveWriter::add_entry`], with `meta` already taken from the
    /// handle. The entry size is `meta.len()`.
    pub fn add_entry_with_metadata(
        &mut self,
        handle: &mut LockedHandle,
        meta: &Metadata,
        name: &Path,
    ) -> Result<u64> {
        let builder = match &mut self.state {
            WriterState::Open(builder) => builder,
            _ => return Err(Error::NotOpen),
        };

        let source_path = handle.path().to_path_buf();
        let expected = meta.len();

        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(meta, HeaderMode::Complete);
        header.set_size(expected);

        let mut body = SnapshotReader::new(handle.file_mut(), expected);
        let result = builder.append_data(&mut header, name, &mut body);
        let actual = body.read;

        if let Err(source) = result {
            self.abandon();
            if actual < expected && source.kind() == io::ErrorKind::UnexpectedEof {
                return Err(Error::ShortRead {
                    path: source_path,
                    expected,
                    actual,
                });
            }
            return Err(Error::AddEntry {
                path: source_path,
                source,
            });
        }

        self.entries_written += 1;
        self.bytes_written += expected;
        Ok(expected)
    }

    /// Finalizes the archive and closes the output file.
    ///
    /// Writes the tar end-of-archive blocks and the gzip trailer, then flushes.
    /// Calling this when the writer is not open does nothing.
    pub fn close(&mut self) -> Result<()> {
        let builder = match std::mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Open(builder) => builder,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let encoder = (*builder).into_inner()?;
        let buffered = encoder.finish()?;
        let output = buffered.into_inner().map_err(|e| e.into_error())?;
        output.file.sync_all()?;
        log::debug!(
            "Closed archive {} with {} entries",
            self.path.display(),
            self.entries_written
        );
        Ok(())
    }

    /// Returns `true` while entries can be added.
    pub fn is_open(&self) -> bool {
        matches!(self.state, WriterState::Open(_))
    }

    /// Returns `true` once the writer has been closed or abandoned.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, WriterState::Closed)
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written so far.
    pub fn entries_written(&self) -> usize {
        self.entries_written
    }

    /// Content bytes written so far (before compression).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn abandon(&mut self) {
        if let WriterState::Open(builder) = std::mem::replace(&mut self.state, WriterState::Closed)
        {
            log::debug!("Abandoning archive {}", self.path.display());
            self.abandoned.store(true, Ordering::SeqCst);
            drop(builder);
        }
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// Reads exactly `limit` bytes from a data file.
///
/// Stops at `limit` even if the file has grown, and fails with
/// `UnexpectedEof` if it ends early.
struct SnapshotReader<R> {
    inner: R,
    remaining: u64,
    read: u64,
}

impl<R: Read> SnapshotReader<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            read: 0,
        }
    }
}

impl<R: Read> Read for SnapshotReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "data file ended before its recorded size",
            ));
        }
        self.remaining -= n as u64;
        self.read += n as u64;
        Ok(n)
    }
}
