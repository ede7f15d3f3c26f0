use crate::document::{DocumentHandle, PageProvider, RasterImage};
use crate::error::{DocumentLoadError, SynthesisError};
use crate::normalizer::NarrationNormalizer;
use crate::speech::SpeechGateway;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_LANGUAGE: &str = "pt-BR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Reading,
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Reading => "reading",
            SessionState::Error => "error",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub language: String,
    pub normalizer: NarrationNormalizer,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            normalizer: NarrationNormalizer::default(),
        }
    }
}

/// One-time messages for the UI, drained after each command or completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    DocumentLoadFailed { document: String, reason: String },
    PageRenderFailed { page: usize, reason: String },
    NarrationFailed { page: usize, reason: String },
    FinishedDocument { total_pages: usize },
    Closed {
        location: PathBuf,
        page: usize,
        total_pages: usize,
    },
}

/// Read-only view of the session handed to the UI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReaderSnapshot {
    pub state: SessionState,
    pub document: Option<String>,
    pub current_page: usize,
    pub total_pages: usize,
    pub is_reading: bool,
    pub is_muted: bool,
    pub current_text: String,
    #[serde(skip)]
    pub raster: Option<Arc<RasterImage>>,
    pub error: Option<String>,
}

type NarrationFuture = Pin<Box<dyn Future<Output = Result<(), SynthesisError>> + Send>>;

struct Narration {
    page: usize,
    outcome: NarrationFuture,
}

/// Result of the narration that was in flight for `page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationOutcome {
    pub page: usize,
    pub result: Result<(), SynthesisError>,
}

/// State machine for one open document and its narration.
///
/// `Reading` holds exactly one pending narration future. Every transition out
/// of `Reading` cancels the gateway before dropping that future, so audio for a
/// page never outlives the page being displayed.
pub struct ReadingSession {
    provider: Arc<dyn PageProvider>,
    gateway: Arc<dyn SpeechGateway>,
    options: SessionOptions,
    document: Option<DocumentHandle>,
    state: SessionState,
    current_page: usize,
    total_pages: usize,
    current_text: String,
    raster: Option<Arc<RasterImage>>,
    is_muted: bool,
    load_error: Option<String>,
    narration: Option<Narration>,
    notices: VecDeque<Notice>,
}

impl ReadingSession {
    pub fn new(
        provider: Arc<dyn PageProvider>,
        gateway: Arc<dyn SpeechGateway>,
        options: SessionOptions,
    ) -> Self {
        Self {
            provider,
            gateway,
            options,
            document: None,
            state: SessionState::Idle,
            current_page: 0,
            total_pages: 0,
            current_text: String::new(),
            raster: None,
            is_muted: false,
            load_error: None,
            narration: None,
            notices: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn is_reading(&self) -> bool {
        self.state == SessionState::Reading
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn raster(&self) -> Option<&Arc<RasterImage>> {
        self.raster.as_ref()
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            state: self.state,
            document: self.document.as_ref().map(DocumentHandle::display_name),
            current_page: self.current_page,
            total_pages: self.total_pages,
            is_reading: self.is_reading(),
            is_muted: self.is_muted,
            current_text: self.current_text.clone(),
            raster: self.raster.clone(),
            error: self.load_error.clone(),
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Open `document`, closing whatever was open first.
    pub async fn open(&mut self, document: DocumentHandle) {
        self.begin_open(document);
        self.finish_open().await;
    }

    /// Close whatever was open and enter `Loading` for `document`.
    ///
    /// Callers that publish snapshots do so between this and [`finish_open`],
    /// so observers see `Loading` while the provider is counting pages.
    ///
    /// [`finish_open`]: ReadingSession::finish_open
    pub fn begin_open(&mut self, document: DocumentHandle) {
        if self.document.is_some() || self.state != SessionState::Idle {
            debug!(state = %self.state, "Closing current document before opening another");
            self.close();
        }

        info!(path = %document.location().display(), "Opening document");
        self.state = SessionState::Loading;
        self.document = Some(document);
    }

    /// Ask the provider for the page count of the loading document, then show
    /// page 1 or record the failure. No-op outside `Loading`.
    pub async fn finish_open(&mut self) {
        if self.state != SessionState::Loading {
            debug!(state = %self.state, "No document is loading");
            return;
        }
        let Some(document) = self.document.as_ref() else {
            return;
        };
        let name = document.display_name();
        let loaded = match self.provider.total_pages(document).await {
            Ok(0) => Err(DocumentLoadError::Empty(document.location().to_path_buf())),
            other => other,
        };

        match loaded {
            Ok(total_pages) => {
                self.total_pages = total_pages;
                self.show_page(1).await;
                self.state = SessionState::Ready;
                info!(document = %name, total_pages, "Document ready");
            }
            Err(err) => {
                warn!(document = %name, error = %err, "Failed to load document");
                let reason = err.to_string();
                self.total_pages = 0;
                self.state = SessionState::Error;
                self.load_error = Some(reason.clone());
                self.notices.push_back(Notice::DocumentLoadFailed {
                    document: name,
                    reason,
                });
            }
        }
    }

    /// Jump to `page`. Keeps narrating on the new page if narration was running.
    pub async fn go_to_page(&mut self, page: usize) -> bool {
        if !matches!(self.state, SessionState::Ready | SessionState::Reading) {
            debug!(page, state = %self.state, "Ignoring page change without a ready document");
            return false;
        }
        if page < 1 || page > self.total_pages || page == self.current_page {
            debug!(
                page,
                current_page = self.current_page,
                total_pages = self.total_pages,
                "Ignoring page change"
            );
            return false;
        }

        let resume = self.is_reading();
        self.stop_narration();
        info!(from = self.current_page, to = page, resume, "Changing page");
        self.show_page(page).await;
        if resume {
            self.start_narration();
        }
        true
    }

    pub async fn next_page(&mut self) -> bool {
        if self.current_page >= self.total_pages {
            debug!(page = self.current_page, "Already on the last page");
            return false;
        }
        self.go_to_page(self.current_page + 1).await
    }

    pub async fn previous_page(&mut self) -> bool {
        if self.current_page <= 1 {
            debug!(page = self.current_page, "Already on the first page");
            return false;
        }
        self.go_to_page(self.current_page - 1).await
    }

    pub fn toggle_reading(&mut self) {
        match self.state {
            SessionState::Ready => self.start_narration(),
            SessionState::Reading => {
                info!(page = self.current_page, "Stopping narration");
                self.stop_narration();
            }
            other => debug!(state = %other, "Ignoring reading toggle"),
        }
    }

    pub fn toggle_mute(&mut self) {
        self.is_muted = !self.is_muted;
        info!(muted = self.is_muted, "Toggled mute");
        self.gateway.set_muted(self.is_muted);
    }

    /// Stop narration and give the document back to the provider.
    pub fn close(&mut self) {
        self.stop_narration();
        if let Some(document) = self.document.take() {
            info!(
                path = %document.location().display(),
                page = self.current_page,
                total_pages = self.total_pages,
                "Closing document"
            );
            if self.total_pages > 0 {
                self.notices.push_back(Notice::Closed {
                    location: document.location().to_path_buf(),
                    page: self.current_page,
                    total_pages: self.total_pages,
                });
            }
            self.provider.release(&document);
        }
        self.state = SessionState::Idle;
        self.current_page = 0;
        self.total_pages = 0;
        self.current_text.clear();
        self.raster = None;
        self.load_error = None;
    }

    /// Wait for the in-flight narration. Pending forever when nothing is
    /// narrating. Cancel safe: dropping this future leaves the narration intact.
    pub async fn next_narration_outcome(&mut self) -> NarrationOutcome {
        let Some(narration) = self.narration.as_mut() else {
            return std::future::pending().await;
        };
        let result = narration.outcome.as_mut().await;
        let page = narration.page;
        self.narration = None;
        NarrationOutcome { page, result }
    }

    /// Apply a completed narration: auto-advance, stop at the end, or report.
    pub async fn finish_narration(&mut self, outcome: NarrationOutcome) {
        if self.state != SessionState::Reading || outcome.page != self.current_page {
            debug!(
                page = outcome.page,
                current_page = self.current_page,
                state = %self.state,
                "Ignoring stale narration outcome"
            );
            return;
        }

        match outcome.result {
            Ok(()) if self.current_page < self.total_pages => {
                let next = self.current_page + 1;
                info!(
                    from = self.current_page,
                    to = next,
                    total_pages = self.total_pages,
                    "Page narrated; advancing"
                );
                self.show_page(next).await;
                self.start_narration();
            }
            Ok(()) => {
                info!(page = self.current_page, "Reached the end of the document");
                self.state = SessionState::Ready;
                self.notices.push_back(Notice::FinishedDocument {
                    total_pages: self.total_pages,
                });
            }
            Err(SynthesisError::Cancelled) => {
                debug!(page = outcome.page, "Narration was cancelled");
                self.state = SessionState::Ready;
            }
            Err(err) => {
                warn!(page = outcome.page, error = %err, "Narration failed");
                self.state = SessionState::Ready;
                self.notices.push_back(Notice::NarrationFailed {
                    page: outcome.page,
                    reason: err.to_string(),
                });
            }
        }
    }

    async fn show_page(&mut self, page: usize) {
        let Some(document) = self.document.as_ref() else {
            return;
        };

        let raster = match self.provider.render_page(document, page).await {
            Ok(raster) => Some(Arc::new(raster)),
            Err(err) => {
                warn!(page, error = %err, "Failed to render page; continuing with text only");
                self.notices.push_back(Notice::PageRenderFailed {
                    page,
                    reason: err.to_string(),
                });
                None
            }
        };
        let text = self.provider.extract_text(document, page).await;

        self.current_text = self.options.normalizer.normalize(&text);
        self.current_page = page;
        self.raster = raster;
        debug!(page, chars = self.current_text.len(), "Page loaded");
    }

    fn start_narration(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let text = self.current_text.clone();
        let language = self.options.language.clone();
        let muted = self.is_muted;
        info!(page = self.current_page, chars = text.len(), "Starting narration");
        self.narration = Some(Narration {
            page: self.current_page,
            outcome: Box::pin(async move { gateway.speak(&text, &language, muted).await }),
        });
        self.state = SessionState::Reading;
    }

    fn stop_narration(&mut self) {
        if self.narration.is_some() {
            self.gateway.cancel();
            self.narration = None;
        }
        if self.state == SessionState::Reading {
            self.state = SessionState::Ready;
        }
    }
}
