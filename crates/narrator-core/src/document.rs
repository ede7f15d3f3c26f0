//! Contract for the document backend the session reads pages from.

use crate::error::{DocumentLoadError, PageRenderError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to an open document.
///
/// Not `Clone`: a session owns its handle exclusively and gives it back to the
/// provider through `PageProvider::release` when it closes.
#[derive(Debug, PartialEq, Eq)]
pub struct DocumentHandle {
    id: u64,
    location: PathBuf,
}

impl DocumentHandle {
    pub fn open(location: impl Into<PathBuf>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            location: location.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn display_name(&self) -> String {
        self.location
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string()
    }
}

/// RGBA8 page raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Page numbers are 1-indexed.
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn total_pages(&self, doc: &DocumentHandle) -> Result<usize, DocumentLoadError>;

    async fn render_page(
        &self,
        doc: &DocumentHandle,
        page: usize,
    ) -> Result<RasterImage, PageRenderError>;

    /// Returns an empty string on any failure; narration degrades to silence.
    async fn extract_text(&self, doc: &DocumentHandle, page: usize) -> String;

    /// Drop anything cached for `doc`.
    fn release(&self, _doc: &DocumentHandle) {}
}

#[cfg(test)]
mod tests {
    use super::DocumentHandle;

    #[test]
    fn handles_get_distinct_ids() {
        let first = DocumentHandle::open("/tmp/a.txt");
        let second = DocumentHandle::open("/tmp/a.txt");
        assert_ne!(first.id(), second.id());
        assert_eq!(first.display_name(), "a.txt");
    }
}
