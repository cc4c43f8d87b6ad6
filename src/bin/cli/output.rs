//! Output formatting for the backup summary.

use serde_json::json;
use std::path::Path;
use whisper_archive::BackupReport;

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats the summary of a finished run
    fn format_report(&self, archive: &Path, report: &BackupReport) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_report(&self, archive: &Path, report: &BackupReport) -> String {
        let mut output = String::new();

        if !report.archive_created {
            output.push_str(&format!(
                "Backup interrupted before {} was created\n",
                archive.display()
            ));
            return output;
        }
        if report.interrupted {
            output.push_str("Backup interrupted, archive holds the files written so far\n");
        }
        output.push_str(&format!(
            "Archived {} files ({} -> {}) to {}\n",
            report.entries_written,
            humanize_bytes(report.bytes_written),
            humanize_bytes(report.archive_size),
            archive.display()
        ));

        if !report.skipped.is_empty() {
            output.push_str(&format!("Skipped {} files:\n", report.skipped.len()));
            for skipped in &report.skipped {
                output.push_str(&format!("  {}: {}\n", skipped.entry_name, skipped.reason));
            }
        }

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, archive: &Path, report: &BackupReport) -> String {
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| {
                json!({
                    "entry": s.entry_name,
                    "path": s.path.display().to_string(),
                    "reason": s.reason,
                })
            })
            .collect();

        let obj = json!({
            "archive": archive.display().to_string(),
            "complete": report.is_complete(),
            "interrupted": report.interrupted,
            "archive_created": report.archive_created,
            "entries_written": report.entries_written,
            "bytes_written": report.bytes_written,
            "archive_size": report.archive_size,
            "skipped": skipped,
        });

        let mut text = serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string());
        text.push('\n');
        text
    }
}

/// Creates a formatter for the given output format
pub fn create_formatter(format: crate::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        crate::OutputFormat::Human => Box::new(HumanFormatter),
        crate::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Formats bytes as human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
