//! Command implementation for the CLI tool.

use std::path::Path;
use std::time::Duration;

use whisper_archive::{BackupOptions, CancelToken, LockWait};

use crate::OutputFormat;
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::create_formatter;
use crate::progress::CliProgress;

/// Configuration for the backup command.
pub struct BackupConfig<'a> {
    pub whisper_dir: &'a Path,
    pub tar_file: &'a Path,
    pub suffix: &'a str,
    pub level: u32,
    pub lock_timeout: Option<u64>,
    pub follow_links: bool,
    pub format: OutputFormat,
    pub quiet: bool,
    pub show_progress: bool,
}

fn build_options(config: &BackupConfig<'_>) -> whisper_archive::Result<BackupOptions> {
    let lock_wait = match config.lock_timeout {
        Some(secs) => LockWait::Timeout(Duration::from_secs(secs)),
        None => LockWait::Blocking,
    };

    Ok(BackupOptions::new()
        .suffix(config.suffix)?
        .level(config.level)?
        .lock_wait(lock_wait)
        .follow_links(config.follow_links))
}

/// Backup command implementation
pub fn backup(config: &BackupConfig<'_>, cancel: &CancelToken) -> ExitCode {
    let formatter = create_formatter(config.format);

    let options = match build_options(config) {
        Ok(o) => o,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::BadArgs;
        }
    };

    let mut progress = CliProgress::new(config.show_progress);

    let report = match whisper_archive::run(
        config.whisper_dir,
        config.tar_file,
        &options,
        &mut progress,
        cancel,
    ) {
        Ok(r) => r,
        Err(e) => {
            progress.abandon("Failed");
            log::error!("{}", e);
            return error_to_exit_code(&e);
        }
    };

    progress.finish();

    if !config.quiet {
        print!("{}", formatter.format_report(config.tar_file, &report));
    }

    // Interrupted runs have finalized their archive and exit 0. Only a second
    // Ctrl+C, handled in main, exits with USER_INTERRUPT.
    if report.interrupted {
        log::info!("Interrupted, archive holds {} files", report.entries_written);
    }
    ExitCode::Success
}
