//! The backup run: enumerate, lock, archive, one file at a time.

use std::path::Path;

use crate::archive::ArchiveWriter;
use crate::enumerate::DataFiles;
use crate::lock::{LockOutcome, SkippedFile, lock_candidate};
use crate::options::BackupOptions;
use crate::progress::{BackupProgress, CancelToken};
use crate::{Error, Result};

/// Summary of a finished backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Entries written to the archive.
    pub entries_written: usize,
    /// Content bytes written (before compression).
    pub bytes_written: u64,
    /// Files left out because they could not be opened or locked.
    pub skipped: Vec<SkippedFile>,
    /// Whether the run stopped early on cancellation.
    pub interrupted: bool,
    /// Whether the archive file was created. `false` only when the run was
    /// cancelled before it started.
    pub archive_created: bool,
    /// Size of the finished archive on disk, 0 if none was created.
    pub archive_size: u64,
}

impl BackupReport {
    /// Returns `true` if every data file found made it into the archive.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && !self.interrupted
    }
}

/// Backs up the data files under `source` into a gzipped tar at `destination`.
///
/// The archive is created before the tree is walked, so an unwritable
/// destination fails without any data file being opened. Files that cannot be
/// opened or locked are skipped and listed in the report. Any other error ends
/// the run and leaves the archive unfinished: it gets no end-of-archive blocks
/// and no gzip trailer, so it cannot pass for a complete backup.
///
/// `cancel` (and [`BackupProgress::should_cancel`]) is checked before each file
/// and while a lock is contended. On cancellation the archive is finalized with
/// the entries written so far and the report has `interrupted` set; a file
/// whose entry has started is always completed first.
pub fn run<P>(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &BackupOptions,
    progress: &mut P,
    cancel: &CancelToken,
) -> Result<BackupReport>
where
    P: BackupProgress + ?Sized,
{
    let source = source.as_ref();
    let destination = destination.as_ref();

    check_source(source)?;

    let mut report = BackupReport::default();
    if cancel.is_cancelled() {
        log::debug!("Cancelled before the archive was created");
        report.interrupted = true;
        return Ok(report);
    }

    log::info!("Creating tar file: {}", destination.display());
    let mut writer = ArchiveWriter::create(destination, options.level)?;
    report.archive_created = true;

    let files = DataFiles::with_follow_links(source, options.suffix.clone(), options.follow_links);
    for candidate in files {
        if cancel.is_cancelled() || progress.should_cancel() {
            report.interrupted = true;
            break;
        }
        let candidate = candidate?;

        log::debug!("Locking file: {}", candidate.path.display());
        let mut handle = match lock_candidate(&candidate, options.lock_wait, cancel) {
            Ok(LockOutcome::Locked(handle)) => handle,
            Ok(LockOutcome::Skipped(skipped)) => {
                log::warn!(
                    "An error occurred locking file {}: {}",
                    skipped.path.display(),
                    skipped.reason
                );
                progress.on_skip(&skipped);
                report.skipped.push(skipped);
                continue;
            }
            Err(Error::Cancelled) => {
                report.interrupted = true;
                break;
            }
            Err(e) => return Err(e),
        };
        log::debug!("File {} was successfully locked.", candidate.path.display());

        let entry_name = candidate.entry_name();
        let meta = handle.metadata().map_err(|source| Error::AddEntry {
            path: candidate.path.clone(),
            source,
        })?;
        log::info!("Adding {} to tar.", candidate.path.display());
        progress.on_entry_start(&entry_name, meta.len());

        let bytes = writer.add_entry_with_metadata(&mut handle, &meta, &candidate.relative)?;
        if let Err(e) = handle.release() {
            log::debug!("Unlocking {} failed: {}", candidate.path.display(), e);
        }

        log::debug!(
            "File {} was successfully added to tar.",
            candidate.path.display()
        );
        progress.on_entry_complete(&entry_name, bytes);
    }

    if report.interrupted {
        log::debug!("Interrupted, finishing archive with entries written so far");
    }

    writer.close()?;

    report.entries_written = writer.entries_written();
    report.bytes_written = writer.bytes_written();
    report.archive_size = std::fs::metadata(destination)?.len();
    Ok(report)
}

fn check_source(source: &Path) -> Result<()> {
    let meta = std::fs::metadata(source).map_err(|e| Error::InvalidSource {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(Error::InvalidSource {
            path: source.to_path_buf(),
            reason: "not a directory".into(),
        });
    }
    Ok(())
}
