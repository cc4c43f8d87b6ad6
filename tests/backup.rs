//! End-to-end backup runs against scratch source trees.

use std::fs::{self, File};
use std::path::Path;
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use tempfile::TempDir;
use whisper_archive::{
    ArchiveWriter, BackupOptions, BackupProgress, CancelToken, Error, LockWait, NoProgress,
    StatisticsProgress,
};

mod common;

fn backup(source: &Path, dest: &Path, options: &BackupOptions) -> whisper_archive::BackupReport {
    whisper_archive::run(source, dest, options, &mut NoProgress, &CancelToken::new())
        .expect("backup failed")
}

// =============================================================================
// Completeness
// =============================================================================

#[test]
fn test_scenario_relative_names_and_content() {
    let source = TempDir::new().unwrap();
    common::write_tree(
        source.path(),
        &[
            ("a/1.wsp", b"first series"),
            ("a/2.wsp", b"second series"),
            ("b/3.wsp", b"third series"),
            ("a/readme.txt", b"not a data file"),
        ],
    );
    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");

    let report = backup(source.path(), &dest, &BackupOptions::new());

    assert_eq!(report.entries_written, 3);
    assert!(report.is_complete());
    assert_eq!(report.bytes_written, 12 + 13 + 12);
    assert!(report.archive_size > 0);

    let entries = common::read_archive(&dest);
    let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a/1.wsp", "a/2.wsp", "b/3.wsp"]);

    for entry in &entries {
        let original = fs::read(source.path().join(&entry.name)).unwrap();
        assert_eq!(entry.data, original, "content mismatch for {}", entry.name);
        assert_eq!(entry.size, original.len() as u64);
    }
}

#[test]
fn test_empty_tree_gives_valid_empty_archive() {
    let source = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let dest = out.path().join("empty.tar.gz");

    let report = backup(source.path(), &dest, &BackupOptions::new());

    assert_eq!(report.entries_written, 0);
    assert!(dest.exists());
    assert!(common::read_archive(&dest).is_empty());
}

#[test]
fn test_large_file_and_long_path() {
    let source = TempDir::new().unwrap();
    let data: Vec<u8> = (0..1_048_576u32).map(|i| (i % 251) as u8).collect();
    let long_dir = "carbon/agents/".to_string() + &"really_long_metric_segment/".repeat(6);
    let long_name = format!("{long_dir}cpuUsage.wsp");
    assert!(long_name.len() > 100);
    common::write_tree(source.path(), &[(long_name.as_str(), data.as_slice())]);

    let out = TempDir::new().unwrap();
    let dest = out.path().join("big.tar.gz");
    backup(source.path(), &dest, &BackupOptions::new().level(1).unwrap());

    let entries = common::read_archive(&dest);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, long_name);
    assert_eq!(entries[0].data, data);
}

#[cfg(unix)]
#[test]
fn test_metadata_preserved() {
    use std::os::unix::fs::PermissionsExt;

    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("m/load.wsp", b"load")]);
    let path = source.path().join("m/load.wsp");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(1_500_000_000, 0))
        .unwrap();

    let out = TempDir::new().unwrap();
    let dest = out.path().join("meta.tar.gz");
    backup(source.path(), &dest, &BackupOptions::new());

    let entries = common::read_archive(&dest);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mtime, 1_500_000_000);
    assert_eq!(entries[0].mode & 0o777, 0o640);
}

#[test]
fn test_existing_destination_is_replaced() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("x.wsp", b"x")]);
    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");
    fs::write(&dest, vec![0xAB; 4096]).unwrap();

    backup(source.path(), &dest, &BackupOptions::new());

    assert_eq!(common::entry_names(&dest), vec!["x.wsp"]);
}

#[test]
fn test_custom_suffix() {
    let source = TempDir::new().unwrap();
    common::write_tree(
        source.path(),
        &[("a/1.dat", b"1"), ("a/2.wsp", b"2"), ("b/3.dat", b"3")],
    );
    let out = TempDir::new().unwrap();
    let dest = out.path().join("dat.tar.gz");

    backup(source.path(), &dest, &BackupOptions::new().suffix(".dat").unwrap());

    assert_eq!(common::entry_names(&dest), vec!["a/1.dat", "b/3.dat"]);
}

#[test]
fn test_progress_callbacks() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("a/1.wsp", b"11"), ("b/2.wsp", b"222")]);
    let out = TempDir::new().unwrap();

    let mut progress = StatisticsProgress::new();
    whisper_archive::run(
        source.path(),
        out.path().join("p.tar.gz"),
        &BackupOptions::new(),
        &mut progress,
        &CancelToken::new(),
    )
    .unwrap();

    let mut completed = progress.completed.clone();
    completed.sort();
    assert_eq!(completed, vec!["a/1.wsp", "b/2.wsp"]);
    assert_eq!(progress.bytes, 5);
    assert!(progress.skipped.is_empty());
}

// =============================================================================
// Graceful skip
// =============================================================================

#[test]
fn test_contended_file_is_skipped() {
    let source = TempDir::new().unwrap();
    common::write_tree(
        source.path(),
        &[("a/1.wsp", b"one"), ("a/2.wsp", b"two"), ("b/3.wsp", b"three")],
    );

    // Held by a "writer" for the whole run.
    let writer = File::open(source.path().join("a/2.wsp")).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();

    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");
    let options = BackupOptions::new().lock_wait(LockWait::Timeout(Duration::from_millis(100)));
    let report = backup(source.path(), &dest, &options);

    assert_eq!(report.entries_written, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].entry_name, "a/2.wsp");
    assert!(!report.is_complete());
    assert_eq!(common::entry_names(&dest), vec!["a/1.wsp", "b/3.wsp"]);

    drop(writer);
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_is_skipped() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("ok.wsp", b"ok")]);
    std::os::unix::fs::symlink(
        source.path().join("vanished.target"),
        source.path().join("vanished.wsp"),
    )
    .unwrap();

    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");
    let report = backup(source.path(), &dest, &BackupOptions::new());

    assert_eq!(report.entries_written, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].entry_name, "vanished.wsp");
    assert_eq!(common::entry_names(&dest), vec!["ok.wsp"]);
}

#[test]
fn test_blocking_wait_captures_file_once_released() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("busy.wsp", b"eventually")]);

    let writer = File::open(source.path().join("busy.wsp")).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        drop(writer);
    });

    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");
    let report = backup(source.path(), &dest, &BackupOptions::new());
    releaser.join().unwrap();

    assert!(report.is_complete());
    assert_eq!(common::entry_names(&dest), vec!["busy.wsp"]);
}

// =============================================================================
// Fatal errors
// =============================================================================

#[test]
fn test_unwritable_destination_fails_before_reading() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("a/1.wsp", b"one")]);
    let out = TempDir::new().unwrap();
    let dest = out.path().join("no/such/dir/backup.tar.gz");

    let mut progress = StatisticsProgress::new();
    let result = whisper_archive::run(
        source.path(),
        &dest,
        &BackupOptions::new(),
        &mut progress,
        &CancelToken::new(),
    );

    assert!(matches!(result, Err(Error::CreateArchive { .. })));
    assert!(!dest.exists());
    assert!(progress.current_entry.is_none());
    assert!(progress.completed.is_empty());
    assert!(progress.skipped.is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlink_loop_is_traversal_error() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("a/1.wsp", b"one")]);
    std::os::unix::fs::symlink(source.path(), source.path().join("a/loop")).unwrap();

    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");
    let result = whisper_archive::run(
        source.path(),
        &dest,
        &BackupOptions::new().follow_links(true),
        &mut NoProgress,
        &CancelToken::new(),
    );

    assert!(matches!(result, Err(Error::Traversal(_))));
    // The failed run must not leave an archive that passes for complete.
    assert!(dest.exists());
    assert!(!common::gzip_is_complete(&dest));
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_traversal_error() {
    use std::os::unix::fs::PermissionsExt;

    let source = TempDir::new().unwrap();
    common::write_tree(
        source.path(),
        &[("a/1.wsp", b"one"), ("sealed/2.wsp", b"two")],
    );
    let sealed = source.path().join("sealed");
    fs::set_permissions(&sealed, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not stop a privileged user.
    if fs::read_dir(&sealed).is_ok() {
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let out = TempDir::new().unwrap();
    let dest = out.path().join("backup.tar.gz");
    let result = whisper_archive::run(
        source.path(),
        &dest,
        &BackupOptions::new(),
        &mut NoProgress,
        &CancelToken::new(),
    );
    fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(Error::Traversal(_))));
    assert!(!common::gzip_is_complete(&dest));
}

// =============================================================================
// Finalization and interruption
// =============================================================================

#[test]
fn test_close_twice() {
    let out = TempDir::new().unwrap();
    let dest = out.path().join("twice.tar.gz");

    let mut writer = ArchiveWriter::create(&dest, 9).unwrap();
    writer.close().unwrap();
    writer.close().unwrap();

    assert!(common::read_archive(&dest).is_empty());
}

/// Requests cancellation once `limit` entries are written.
struct StopAfter {
    limit: usize,
    written: Vec<String>,
}

impl BackupProgress for StopAfter {
    fn on_entry_complete(&mut self, entry_name: &str, _bytes: u64) {
        self.written.push(entry_name.to_string());
    }

    fn should_cancel(&self) -> bool {
        self.written.len() >= self.limit
    }
}

#[test]
fn test_interrupt_keeps_archive_valid() {
    let source = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = (0..6)
        .map(|i| (format!("d{}/m{}.wsp", i % 2, i), vec![i as u8; 1000 + i]))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    common::write_tree(source.path(), &borrowed);

    let out = TempDir::new().unwrap();
    let dest = out.path().join("partial.tar.gz");
    let mut progress = StopAfter {
        limit: 2,
        written: Vec::new(),
    };

    let report = whisper_archive::run(
        source.path(),
        &dest,
        &BackupOptions::new(),
        &mut progress,
        &CancelToken::new(),
    )
    .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.entries_written, 2);

    let entries = common::read_archive(&dest);
    let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, progress.written);
    for entry in &entries {
        let original = fs::read(source.path().join(&entry.name)).unwrap();
        assert_eq!(entry.data, original);
    }
}

#[test]
fn test_cancel_while_waiting_for_lock() {
    let source = TempDir::new().unwrap();
    common::write_tree(source.path(), &[("stuck.wsp", b"never read")]);

    let writer = File::open(source.path().join("stuck.wsp")).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();

    let cancel = CancelToken::new();
    let signal = cancel.clone();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        signal.cancel();
    });

    let out = TempDir::new().unwrap();
    let dest = out.path().join("cancelled.tar.gz");
    let report = whisper_archive::run(
        source.path(),
        &dest,
        &BackupOptions::new(),
        &mut NoProgress,
        &cancel,
    )
    .unwrap();
    interrupter.join().unwrap();

    assert!(report.interrupted);
    assert_eq!(report.entries_written, 0);
    assert!(report.skipped.is_empty());
    assert!(common::read_archive(&dest).is_empty());

    drop(writer);
}
