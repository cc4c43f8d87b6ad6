//! Discovery of data files under a source tree.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::Result;

/// Suffix of Whisper data files.
pub const DEFAULT_SUFFIX: &str = ".wsp";

/// A data file found under the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Path of the file as reached by the walk (rooted at the source path).
    pub path: PathBuf,
    /// Path relative to the source root. Used as the archive entry name.
    pub relative: PathBuf,
}

impl CandidateFile {
    /// Returns the entry name with `/` separators.
    pub fn entry_name(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Lazy iterator over the data files of a source tree.
///
/// Every subdirectory is visited. Names are matched against the suffix
/// byte-wise, so non-UTF-8 file names are handled. Order follows the
/// directory listing and is not sorted.
///
/// A directory that cannot be read yields an [`Error::Traversal`] item.
///
/// [`Error::Traversal`]: crate::Error::Traversal
pub struct DataFiles {
    root: PathBuf,
    suffix: String,
    walker: walkdir::IntoIter,
}

impl DataFiles {
    /// Starts a walk of `root`, matching names that end with `suffix`.
    pub fn new(root: impl AsRef<Path>, suffix: impl Into<String>) -> Self {
        Self::with_follow_links(root, suffix, false)
    }

    /// Like [`DataFiles::new`], optionally descending through symlinked
    /// directories.
    pub fn with_follow_links(
        root: impl AsRef<Path>,
        suffix: impl Into<String>,
        follow_links: bool,
    ) -> Self {
        let root = root.as_ref().to_path_buf();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(follow_links)
            .into_iter();
        Self {
            root,
            suffix: suffix.into(),
            walker,
        }
    }

    fn matches(&self, name: &std::ffi::OsStr) -> bool {
        name.as_encoded_bytes().ends_with(self.suffix.as_bytes())
    }
}

impl Iterator for DataFiles {
    type Item = Result<CandidateFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            // Symlinks that are not followed are kept: opening them later
            // resolves the target, and a dangling one is skipped at lock time.
            if entry.file_type().is_dir() || !self.matches(entry.file_name()) {
                continue;
            }
            if entry.path_is_symlink() && entry.path().is_dir() {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    log::debug!("Ignoring {} outside of source root", entry.path().display());
                    continue;
                }
            };

            return Some(Ok(CandidateFile {
                path: entry.into_path(),
                relative,
            }));
        }
    }
}
