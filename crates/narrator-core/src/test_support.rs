//! In-memory provider and gateway doubles shared by session and controller tests.

use crate::document::{DocumentHandle, PageProvider, RasterImage};
use crate::error::{DocumentLoadError, PageRenderError, SynthesisError};
use crate::speech::SpeechGateway;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProviderCall {
    TotalPages,
    Render(usize),
    Extract(usize),
    Release,
}

#[derive(Default)]
pub(crate) struct FakeProvider {
    pages: Vec<String>,
    fail_load: AtomicBool,
    load_delay: Mutex<Duration>,
    unrenderable: AtomicUsize,
    calls: Mutex<Vec<ProviderCall>>,
}

impl FakeProvider {
    pub(crate) fn with_pages(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|page| page.to_string()).collect(),
            ..Self::default()
        })
    }

    pub(crate) fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Makes `total_pages` take `delay`, as a slow document scan would.
    pub(crate) fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = delay;
    }

    pub(crate) fn set_unrenderable(&self, page: usize) {
        self.unrenderable.store(page, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PageProvider for FakeProvider {
    async fn total_pages(&self, doc: &DocumentHandle) -> Result<usize, DocumentLoadError> {
        self.record(ProviderCall::TotalPages);
        let delay = *self.load_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(DocumentLoadError::Unsupported {
                path: doc.location().to_path_buf(),
                reason: "corrupt header".to_string(),
            });
        }
        Ok(self.pages.len())
    }

    async fn render_page(
        &self,
        _doc: &DocumentHandle,
        page: usize,
    ) -> Result<RasterImage, PageRenderError> {
        self.record(ProviderCall::Render(page));
        if page == 0 || page > self.pages.len() {
            return Err(PageRenderError::OutOfRange {
                page,
                total: self.pages.len(),
            });
        }
        if self.unrenderable.load(Ordering::SeqCst) == page {
            return Err(PageRenderError::NoRaster { page });
        }
        Ok(RasterImage::new(1, 1, vec![255, 255, 255, 255]))
    }

    async fn extract_text(&self, _doc: &DocumentHandle, page: usize) -> String {
        self.record(ProviderCall::Extract(page));
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn release(&self, _doc: &DocumentHandle) {
        self.record(ProviderCall::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GatewayCall {
    Speak { text: String, muted: bool },
    Cancel,
    SetMuted(bool),
}

enum Script {
    Succeed,
    FailOn(String),
    CancelOn(String),
}

/// Gateway that takes `delay` per non-empty narration and records every call.
pub(crate) struct ScriptedGateway {
    delay: Duration,
    script: Script,
    calls: Mutex<Vec<GatewayCall>>,
}

impl ScriptedGateway {
    fn build(delay: Duration, script: Script) -> Arc<Self> {
        Arc::new(Self {
            delay,
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Self::build(delay, Script::Succeed)
    }

    pub(crate) fn failing_on(delay: Duration, text: &str) -> Arc<Self> {
        Self::build(delay, Script::FailOn(text.to_string()))
    }

    pub(crate) fn cancelled_on(delay: Duration, text: &str) -> Arc<Self> {
        Self::build(delay, Script::CancelOn(text.to_string()))
    }

    pub(crate) fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Speak { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SpeechGateway for ScriptedGateway {
    async fn speak(&self, text: &str, _language: &str, muted: bool) -> Result<(), SynthesisError> {
        self.record(GatewayCall::Speak {
            text: text.to_string(),
            muted,
        });
        if !text.is_empty() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::FailOn(failing) if failing == text => {
                Err(SynthesisError::Local("scripted failure".to_string()))
            }
            Script::CancelOn(cancelled) if cancelled == text => Err(SynthesisError::Cancelled),
            _ => Ok(()),
        }
    }

    fn cancel(&self) {
        self.record(GatewayCall::Cancel);
    }

    fn set_muted(&self, muted: bool) {
        self.record(GatewayCall::SetMuted(muted));
    }
}
