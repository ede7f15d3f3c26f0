//! Filesystem-backed page provider.
//!
//! A document is one of:
//! - a UTF-8 text file, paginated on load (no raster);
//! - a single page image;
//! - a directory of page images ordered by file name.
//!
//! Images may carry a same-stem `.txt` file with the page's text.

use crate::pagination::paginate;
use async_trait::async_trait;
use narrator_core::{
    DocumentHandle, DocumentLoadError, PageProvider, PageRenderError, RasterImage,
};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Debug)]
enum Layout {
    Text(Vec<String>),
    Images(Vec<ImagePage>),
}

impl Layout {
    fn page_count(&self) -> usize {
        match self {
            Layout::Text(pages) => pages.len(),
            Layout::Images(pages) => pages.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct ImagePage {
    image: PathBuf,
    text: Option<PathBuf>,
}

impl ImagePage {
    fn new(image: PathBuf) -> Self {
        let sidecar = image.with_extension("txt");
        let text = sidecar.is_file().then_some(sidecar);
        Self { image, text }
    }
}

pub struct FsPageProvider {
    chars_per_line: usize,
    lines_per_page: usize,
    layouts: Mutex<HashMap<u64, Arc<Layout>>>,
}

impl FsPageProvider {
    pub fn new(chars_per_line: usize, lines_per_page: usize) -> Self {
        Self {
            chars_per_line,
            lines_per_page,
            layouts: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, doc: &DocumentHandle) -> Option<Arc<Layout>> {
        self.layouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&doc.id())
            .cloned()
    }

    async fn layout(&self, doc: &DocumentHandle) -> Result<Arc<Layout>, DocumentLoadError> {
        if let Some(layout) = self.cached(doc) {
            return Ok(layout);
        }

        let path = doc.location().to_path_buf();
        let (chars_per_line, lines_per_page) = (self.chars_per_line, self.lines_per_page);
        let layout = tokio::task::spawn_blocking(move || {
            load_layout(&path, chars_per_line, lines_per_page)
        })
        .await
        .map_err(|err| DocumentLoadError::Unsupported {
            path: doc.location().to_path_buf(),
            reason: format!("loader task failed: {err}"),
        })??;

        let layout = Arc::new(layout);
        self.layouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(doc.id(), Arc::clone(&layout));
        Ok(layout)
    }
}

#[async_trait]
impl PageProvider for FsPageProvider {
    async fn total_pages(&self, doc: &DocumentHandle) -> Result<usize, DocumentLoadError> {
        let layout = self.layout(doc).await?;
        Ok(layout.page_count())
    }

    async fn render_page(
        &self,
        doc: &DocumentHandle,
        page: usize,
    ) -> Result<RasterImage, PageRenderError> {
        let layout = self.layout(doc).await.map_err(|err| PageRenderError::Decode {
            page,
            reason: err.to_string(),
        })?;
        let total = layout.page_count();
        if page == 0 || page > total {
            return Err(PageRenderError::OutOfRange { page, total });
        }

        let image_path = match layout.as_ref() {
            Layout::Text(_) => return Err(PageRenderError::NoRaster { page }),
            Layout::Images(pages) => pages[page - 1].image.clone(),
        };
        debug!(page, path = %image_path.display(), "Decoding page image");
        tokio::task::spawn_blocking(move || decode_page(&image_path, page))
            .await
            .map_err(|err| PageRenderError::Decode {
                page,
                reason: format!("decoder task failed: {err}"),
            })?
    }

    async fn extract_text(&self, doc: &DocumentHandle, page: usize) -> String {
        let layout = match self.layout(doc).await {
            Ok(layout) => layout,
            Err(err) => {
                warn!(page, "Cannot extract text: {err}");
                return String::new();
            }
        };
        let index = match page.checked_sub(1) {
            Some(index) if index < layout.page_count() => index,
            _ => return String::new(),
        };

        match layout.as_ref() {
            Layout::Text(pages) => pages[index].clone(),
            Layout::Images(pages) => {
                let Some(sidecar) = pages[index].text.clone() else {
                    debug!(page, "Page image has no text file");
                    return String::new();
                };
                match tokio::fs::read_to_string(&sidecar).await {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(page, path = %sidecar.display(), "Failed to read page text: {err}");
                        String::new()
                    }
                }
            }
        }
    }

    fn release(&self, doc: &DocumentHandle) {
        let removed = self
            .layouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&doc.id());
        if removed.is_some() {
            debug!(id = doc.id(), "Released document layout");
        }
    }
}

fn load_layout(
    path: &Path,
    chars_per_line: usize,
    lines_per_page: usize,
) -> Result<Layout, DocumentLoadError> {
    let metadata = fs::metadata(path).map_err(|err| io_error(path, err))?;

    if metadata.is_dir() {
        let mut images = Vec::new();
        for entry in fs::read_dir(path).map_err(|err| io_error(path, err))? {
            let entry = entry.map_err(|err| io_error(path, err))?;
            let candidate = entry.path();
            if candidate.is_file() && is_image(&candidate) {
                images.push(candidate);
            }
        }
        images.sort();
        info!(path = %path.display(), pages = images.len(), "Loaded page image directory");
        return Ok(Layout::Images(
            images.into_iter().map(ImagePage::new).collect(),
        ));
    }

    if is_image(path) {
        info!(path = %path.display(), "Loaded single page image");
        return Ok(Layout::Images(vec![ImagePage::new(path.to_path_buf())]));
    }

    let bytes = fs::read(path).map_err(|err| io_error(path, err))?;
    let text = String::from_utf8(bytes).map_err(|_| DocumentLoadError::Unsupported {
        path: path.to_path_buf(),
        reason: "not UTF-8 text or a supported page image".to_string(),
    })?;
    let pages = paginate(&text, chars_per_line, lines_per_page);
    info!(
        path = %path.display(),
        pages = pages.len(),
        chars_per_line,
        lines_per_page,
        "Paginated text document"
    );
    Ok(Layout::Text(pages))
}

fn decode_page(path: &Path, page: usize) -> Result<RasterImage, PageRenderError> {
    let decoded = image::open(path).map_err(|err| PageRenderError::Decode {
        page,
        reason: err.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(RasterImage::new(width, height, rgba.into_raw()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn io_error(path: &Path, err: std::io::Error) -> DocumentLoadError {
    if err.kind() == ErrorKind::NotFound {
        DocumentLoadError::NotFound(path.to_path_buf())
    } else {
        DocumentLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }
}
