//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

/// An entry read back from a finished archive.
#[derive(Debug, Clone)]
pub struct ArchivedEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub size: u64,
    pub mode: u32,
    pub mtime: u64,
}

/// Writes `entries` as files under `root`, creating parent directories.
pub fn write_tree(root: &Path, entries: &[(&str, &[u8])]) {
    for (name, data) in entries {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, data).expect("Failed to write source file");
    }
}

/// Reads every entry of a gzipped tar, in archive order.
///
/// Panics if the archive is not a structurally valid `.tar.gz`.
pub fn read_archive(path: &Path) -> Vec<ArchivedEntry> {
    let file = File::open(path).expect("Failed to open archive");
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut out = Vec::new();
    for entry in archive.entries().expect("Failed to read archive") {
        let mut entry = entry.expect("Corrupt archive entry");
        let header = entry.header().clone();
        let name = entry
            .path()
            .expect("Invalid entry path")
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("Failed to read entry");
        out.push(ArchivedEntry {
            name,
            data,
            size: header.size().expect("Invalid size"),
            mode: header.mode().expect("Invalid mode"),
            mtime: header.mtime().expect("Invalid mtime"),
        });
    }

    // A valid gzip stream must be fully consumed with a correct trailer.
    let mut decoder = archive.into_inner();
    let mut rest = Vec::new();
    decoder
        .read_to_end(&mut rest)
        .expect("Gzip trailer is corrupt");
    out
}

/// Whether the archive's gzip stream decodes to its end with a valid trailer.
pub fn gzip_is_complete(path: &Path) -> bool {
    let file = File::open(path).expect("Failed to open archive");
    let mut rest = Vec::new();
    GzDecoder::new(file).read_to_end(&mut rest).is_ok()
}

/// Sorted entry names of an archive.
pub fn entry_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = read_archive(path).into_iter().map(|e| e.name).collect();
    names.sort();
    names
}
