//! Capability traits consumed by the client.
//!
//! Directory scans do not walk the filesystem themselves; they ask a
//! [`FileEnumerator`] for the list of regular files and forward that list
//! to the batch scan path.

use crate::core::error::{FprotError, Result};

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists the regular files under a directory.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use fprot::core::{FileEnumerator, Result};
/// use async_trait::async_trait;
/// use std::path::{Path, PathBuf};
///
/// #[derive(Debug)]
/// struct Fixed(Vec<PathBuf>);
///
/// #[async_trait]
/// impl FileEnumerator for Fixed {
///     async fn list_files(&self, _dir: &Path) -> Result<Vec<PathBuf>> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait FileEnumerator: Send + Sync + Debug {
    /// Returns the regular files under `dir`.
    ///
    /// # Errors
    ///
    /// - `NotADirectory` - `dir` exists but is not a directory.
    /// - `Io` - `dir` does not exist or cannot be read.
    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// The default enumerator: a recursive walk that keeps regular files.
///
/// Entries that cannot be read during the walk are skipped. Files are
/// returned in walk order with names sorted within each directory.
#[derive(Debug, Clone, Default)]
pub struct WalkDirEnumerator {
    max_depth: Option<usize>,
    follow_links: bool,
}

impl WalkDirEnumerator {
    /// Creates an unbounded recursive enumerator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits how deep the walk descends. `1` lists only direct children.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Follows symbolic links while walking.
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let metadata = std::fs::metadata(dir)?;
        if !metadata.is_dir() {
            return Err(FprotError::NotADirectory {
                path: dir.display().to_string(),
            });
        }

        let mut walker = WalkDir::new(dir)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let files = walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        Ok(files)
    }
}

#[async_trait]
impl FileEnumerator for WalkDirEnumerator {
    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let this = self.clone();
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || this.walk(&dir))
            .await
            .map_err(|e| FprotError::Io(std::io::Error::other(e)))?
    }
}
