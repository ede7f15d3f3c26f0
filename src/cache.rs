//! Remembers how far each document was read.
//!
//! Entries are stored under the cache directory using a hash of the document
//! path as the directory name to avoid filesystem issues. Each holds a small
//! `progress.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const PROGRESS_FILE: &str = "progress.toml";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub page: usize,
    pub total_pages: usize,
    pub percent: f32,
    pub last_read_unix: u64,
}

impl ReadingProgress {
    pub fn new(page: usize, total_pages: usize) -> Self {
        let percent = if total_pages == 0 {
            0.0
        } else {
            let ratio = page.min(total_pages) as f32 / total_pages as f32;
            (ratio * 1000.0).round() / 10.0
        };
        let last_read_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Self {
            page,
            total_pages,
            percent,
            last_read_unix,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressStore {
    root: PathBuf,
}

impl ProgressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn hash_dir(&self, document: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(document.as_os_str().to_string_lossy().as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.root.join(hash)
    }

    /// Last recorded progress for `document`; unreadable entries count as none.
    pub fn load(&self, document: &Path) -> Option<ReadingProgress> {
        let path = self.progress_path(document);
        let data = fs::read_to_string(&path).ok()?;
        match toml::from_str(&data) {
            Ok(progress) => Some(progress),
            Err(err) => {
                debug!(path = %path.display(), "Ignoring unreadable progress entry: {err}");
                None
            }
        }
    }

    pub fn save(&self, document: &Path, progress: &ReadingProgress) -> Result<()> {
        let path = self.progress_path(document);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating cache dir {}", parent.display()))?;
        }
        let contents = toml::to_string(progress).context("Serializing reading progress")?;
        fs::write(&path, contents).with_context(|| format!("Writing {}", path.display()))?;
        debug!(path = %path.display(), page = progress.page, "Saved reading progress");
        Ok(())
    }

    fn progress_path(&self, document: &Path) -> PathBuf {
        self.hash_dir(document).join(PROGRESS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("page-narrator-{label}-{nanos}"))
    }

    #[test]
    fn percent_is_rounded_to_one_decimal() {
        assert_eq!(ReadingProgress::new(1, 3).percent, 33.3);
        assert_eq!(ReadingProgress::new(3, 3).percent, 100.0);
        assert_eq!(ReadingProgress::new(1, 0).percent, 0.0);
    }

    #[test]
    fn saved_progress_is_found_again_per_document() {
        let root = temp_root("progress");
        let store = ProgressStore::new(&root);
        let book = Path::new("/livros/direito-civil.pdf");

        assert!(store.load(book).is_none());
        store.save(book, &ReadingProgress::new(12, 40)).unwrap();

        let loaded = store.load(book).unwrap();
        assert_eq!(loaded.page, 12);
        assert_eq!(loaded.total_pages, 40);
        assert_eq!(loaded.percent, 30.0);
        assert!(store.load(Path::new("/livros/outro.pdf")).is_none());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn corrupt_entry_is_ignored() {
        let root = temp_root("corrupt");
        let store = ProgressStore::new(&root);
        let book = Path::new("/livros/quebrado.pdf");
        let dir = store.hash_dir(book);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PROGRESS_FILE), "page = \"doze\"").unwrap();

        assert!(store.load(book).is_none());

        let _ = fs::remove_dir_all(&root);
    }
}
