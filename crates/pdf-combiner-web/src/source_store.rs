//! Disk storage for uploaded source PDFs.
//!
//! The page model refers to its sources by path and re-reads them on export,
//! so uploads have to live on disk for as long as the session does. Each
//! session gets its own temp directory that is removed when the store (and
//! thus the session) is dropped.
//!
//! As with the session lock itself, reserving a path is a fast metadata
//! operation done inside the lock; the write happens outside with `tokio::fs`.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Per-session directory of uploaded files.
///
/// Every upload goes into its own numbered subdirectory so the original file
/// name is kept (it shows up in page labels) and equal names never collide.
pub struct SourceStore {
    /// Temp directory - auto-cleaned on drop
    dir: TempDir,
    next_slot: usize,
    stored: Vec<PathBuf>,
}

impl SourceStore {
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        debug!("Created source store at {}", dir.path().display());
        Ok(Self {
            dir,
            next_slot: 0,
            stored: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a fresh path for an upload named `filename`.
    ///
    /// The parent directory does not exist yet; the caller creates it.
    pub fn reserve_path(&mut self, filename: &str) -> PathBuf {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.dir
            .path()
            .join(format!("{slot:04}"))
            .join(sanitize_filename(filename))
    }

    /// Register a file written to a reserved path.
    pub fn mark_stored(&mut self, path: PathBuf) {
        debug!("Stored upload {}", path.display());
        self.stored.push(path);
    }

    /// Uploaded files, oldest first.
    pub fn stored(&self) -> &[PathBuf] {
        &self.stored
    }

    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Write an upload synchronously (for tests).
    #[cfg(test)]
    pub fn store_sync(&mut self, filename: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.reserve_path(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        self.mark_stored(path.clone());
        Ok(path)
    }
}

/// Keep a browser-supplied name usable as a single path component.
fn sanitize_filename(name: &str) -> String {
    // Browsers may send a full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_keeps_names_apart() {
        let mut store = SourceStore::new().unwrap();
        let first = store.store_sync("a.pdf", b"one").unwrap();
        let second = store.store_sync("a.pdf", b"two").unwrap();

        assert_ne!(first, second);
        assert_eq!(first.file_name().unwrap(), "a.pdf");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert_eq!(store.stored(), [first, second]);
        assert!(store.stored()[0].starts_with(store.dir()));
    }

    #[test]
    fn test_reserve_is_metadata_only() {
        let mut store = SourceStore::new().unwrap();
        let path = store.reserve_path("report.pdf");
        assert!(!path.exists());
        assert!(store.is_empty());

        store.mark_stored(path);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\scan 1.pdf"), "scan 1.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a<b>.pdf"), "a_b_.pdf");
        assert_eq!(sanitize_filename(".."), "document.pdf");
        assert_eq!(sanitize_filename(""), "document.pdf");
    }

    #[test]
    fn test_dir_removed_on_drop() {
        let store = SourceStore::new().unwrap();
        let dir = store.dir().to_path_buf();
        assert!(dir.exists());
        drop(store);
        assert!(!dir.exists());
    }
}
