//! CLI tool for backing up a Whisper store.

mod commands;
mod exit_codes;
mod output;
mod progress;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

use whisper_archive::CancelToken;

/// Backup Whisper Store to a Gzipped Tar Archive
#[derive(Parser)]
#[command(name = "whisper-archive")]
#[command(author, version, about = "Backup Whisper Store to a Gzipped Tar Archive", long_about = None)]
#[command(
    after_help = "Example: whisper-archive -v -w /var/lib/graphite/whisper -t /storage/backup/whisper.tar.gz\n\n\
                  Set WHISPER_LOCK_WRITES = True in carbon.conf for consistent backups."
)]
pub struct Cli {
    /// Whisper Store Directory
    #[arg(short = 'w', long)]
    whisper_dir: PathBuf,

    /// Destination Tar File
    #[arg(short = 't', long)]
    tar_file: PathBuf,

    /// Verbose (-v for info, -vv for debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Suffix of data files to back up
    #[arg(long, default_value = whisper_archive::DEFAULT_SUFFIX)]
    suffix: String,

    /// Gzip compression level (0-9)
    #[arg(short = 'l', long, default_value = "9")]
    level: u32,

    /// Skip a file whose lock is not granted within this many seconds
    #[arg(long, value_name = "SECS")]
    lock_timeout: Option<u64>,

    /// Descend into symlinked directories
    #[arg(long)]
    follow_links: bool,

    /// Output format of the final summary
    #[arg(long, short = 'f', value_enum, default_value = "human")]
    format: OutputFormat,

    /// Suppress the final summary
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Show a progress spinner on stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn init_logging(verbose: u8) {
    // RUST_LOG, when set, overrides the level picked from -v.
    env_logger::Builder::new()
        .filter_level(log_level(verbose))
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // The handler only flags the run; the archive is finalized by the main
    // loop. A second Ctrl+C exits without waiting.
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            eprintln!("\nInterrupted");
            std::process::exit(exit_codes::USER_INTERRUPT);
        }
        log::debug!("SIGINT encountered, exiting...");
        handler_token.cancel();
    }) {
        log::warn!("Cannot install Ctrl+C handler: {}", e);
    }

    let exit_code = commands::backup(
        &commands::BackupConfig {
            whisper_dir: &cli.whisper_dir,
            tar_file: &cli.tar_file,
            suffix: &cli.suffix,
            level: cli.level,
            lock_timeout: cli.lock_timeout,
            follow_links: cli.follow_links,
            format: cli.format,
            quiet: cli.quiet,
            show_progress: cli.progress,
        },
        &cancel,
    );

    std::process::exit(exit_code.code());
}
