use std::path::PathBuf;
use thiserror::Error;

/// The document could not be opened. Terminal for the open attempt.
#[derive(Debug, Error)]
pub enum DocumentLoadError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read document {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document {} has no pages", .0.display())]
    Empty(PathBuf),
    #[error("unsupported document {}: {reason}", .path.display())]
    Unsupported { path: PathBuf, reason: String },
}

/// A page could not be rasterized. Navigation still proceeds.
#[derive(Debug, Error)]
pub enum PageRenderError {
    #[error("page {page} is out of range (document has {total} pages)")]
    OutOfRange { page: usize, total: usize },
    #[error("page {page} has no raster representation")]
    NoRaster { page: usize },
    #[error("failed to decode page {page}: {reason}")]
    Decode { page: usize, reason: String },
}

/// Narration failure reported by the speech gateway or one of its backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("synthesis cancelled")]
    Cancelled,
    #[error("remote synthesis failed on chunk {chunk}: {reason}")]
    Remote { chunk: usize, reason: String },
    #[error("remote synthesis returned no audio for chunk {chunk}")]
    NoAudio { chunk: usize },
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("local synthesis failed: {0}")]
    Local(String),
}

impl SynthesisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SynthesisError::Cancelled)
    }
}
