use super::{AudioSink, LocalSynthesizer, MuteFlag, RemoteSynthesizer, SpeechGateway, SynthesisRequest};
use crate::cancellation::{CancellationExt, CancellationToken};
use crate::error::SynthesisError;
use crate::text_utils::chunk_text;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Remote text-to-speech services commonly cap requests at 5000 bytes.
pub const DEFAULT_CHUNK_LIMIT: usize = 4800;

pub struct SynthesisGateway {
    remote: Option<Arc<dyn RemoteSynthesizer>>,
    local: Arc<dyn LocalSynthesizer>,
    sink: Arc<dyn AudioSink>,
    chunk_limit: usize,
    mute: MuteFlag,
    next_narration: AtomicU64,
    active: Mutex<Option<ActiveSlot>>,
}

/// Token of the narration currently allowed to run, tagged with its id.
struct ActiveSlot {
    id: u64,
    token: CancellationToken,
}

impl SynthesisGateway {
    pub fn new(local: Arc<dyn LocalSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            remote: None,
            local,
            sink,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            mute: MuteFlag::default(),
            next_narration: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteSynthesizer>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit.max(1);
        self
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSlot>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel whatever is in flight and install a fresh token for the caller.
    fn begin(&self) -> ActiveNarration<'_> {
        let id = self.next_narration.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let slot = ActiveSlot {
            id,
            token: token.clone(),
        };
        if let Some(previous) = self.lock_active().replace(slot) {
            debug!(
                previous = previous.id,
                next = id,
                "Cancelling previous narration before starting a new one"
            );
            previous.token.cancel();
        }
        ActiveNarration {
            gateway: self,
            id,
            token,
        }
    }

    /// Clears the slot only if it still belongs to narration `id`.
    fn release(&self, id: u64) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|slot| slot.id == id) {
            *active = None;
        }
    }

    async fn narrate(
        &self,
        text: &str,
        language: &str,
        token: &CancellationToken,
    ) -> Result<(), SynthesisError> {
        if let Some(remote) = &self.remote {
            match self.speak_remote(remote.as_ref(), text, language, token).await {
                Ok(()) => return Ok(()),
                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                Err(err) => {
                    warn!(error = %err, "Remote synthesis failed; falling back to local synthesizer");
                }
            }
        }

        token.check_cancelled()?;
        let request = SynthesisRequest::new(text, language);
        debug!(chars = text.len(), language, "Speaking with local synthesizer");
        let result = self.local.speak(&request, self.mute.is_muted(), token).await;
        if let Err(err) = &result {
            if !err.is_cancelled() {
                warn!(error = %err, "Local synthesis failed");
            }
        }
        result
    }

    async fn speak_remote(
        &self,
        remote: &dyn RemoteSynthesizer,
        text: &str,
        language: &str,
        token: &CancellationToken,
    ) -> Result<(), SynthesisError> {
        let chunks = chunk_text(text, self.chunk_limit);
        debug!(
            chunks = chunks.len(),
            limit = self.chunk_limit,
            "Requesting remote synthesis"
        );

        // One chunk at a time, in text order.
        let mut combined = Vec::new();
        for (idx, chunk) in chunks.into_iter().enumerate() {
            token.check_cancelled()?;
            let request = SynthesisRequest::new(chunk, language);
            let audio = remote
                .synthesize(&request)
                .await
                .map_err(|err| SynthesisError::Remote {
                    chunk: idx,
                    reason: format!("{err:#}"),
                })?;
            if audio.is_empty() {
                return Err(SynthesisError::NoAudio { chunk: idx });
            }
            combined.extend_from_slice(&audio);
        }
        if combined.is_empty() {
            return Err(SynthesisError::NoAudio { chunk: 0 });
        }

        token.check_cancelled()?;
        debug!(bytes = combined.len(), "Playing remote audio");
        self.sink.play(combined, self.mute.clone(), token).await
    }
}

/// Cancels its token when dropped, so abandoning a `speak` future stops playback.
struct ActiveNarration<'a> {
    gateway: &'a SynthesisGateway,
    id: u64,
    token: CancellationToken,
}

impl Drop for ActiveNarration<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        self.gateway.release(self.id);
    }
}

#[async_trait]
impl SpeechGateway for SynthesisGateway {
    async fn speak(&self, text: &str, language: &str, muted: bool) -> Result<(), SynthesisError> {
        let active = self.begin();
        self.mute.set(muted);

        if text.trim().is_empty() {
            debug!("Nothing to narrate; resolving immediately");
            return Ok(());
        }

        info!(
            chars = text.len(),
            language,
            muted,
            remote = self.remote.is_some(),
            "Starting narration"
        );
        let token = active.token.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(SynthesisError::Cancelled),
            result = self.narrate(text, language, &token) => result,
        }
    }

    fn cancel(&self) {
        if let Some(slot) = self.lock_active().take() {
            info!(narration = slot.id, "Cancelling active narration");
            slot.token.cancel();
        } else {
            debug!("Cancel requested with no active narration");
        }
    }

    fn set_muted(&self, muted: bool) {
        debug!(muted, "Updating live mute state");
        self.mute.set(muted);
    }
}
