//! Progress spinner for the CLI.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use whisper_archive::{BackupProgress, SkippedFile};

/// Spinner showing the entry being archived and a running count.
pub struct CliProgress {
    bar: ProgressBar,
    enabled: bool,
}

impl CliProgress {
    /// Creates a new progress display; hidden unless `enabled`
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} files {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };

        Self { bar, enabled }
    }

    /// Finishes the progress display
    pub fn finish(&self) {
        if self.enabled {
            self.bar.finish_and_clear();
        }
    }

    /// Finishes with a custom message
    pub fn abandon(&self, msg: impl Into<String>) {
        if self.enabled {
            self.bar.abandon_with_message(msg.into());
        }
    }
}

impl BackupProgress for CliProgress {
    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        if !self.enabled {
            return;
        }

        // Truncate long names
        let display_name = if entry_name.chars().count() > 60 {
            let tail: String = entry_name
                .chars()
                .rev()
                .take(57)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("...{}", tail)
        } else {
            entry_name.to_string()
        };
        self.bar.set_message(display_name);
    }

    fn on_entry_complete(&mut self, _entry_name: &str, _bytes: u64) {
        self.bar.inc(1);
    }

    fn on_skip(&mut self, skipped: &SkippedFile) {
        if self.enabled {
            self.bar
                .println(format!("skipped {}: {}", skipped.entry_name, skipped.reason));
        }
    }
}
