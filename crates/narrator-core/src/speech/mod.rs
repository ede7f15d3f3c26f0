//! Speech synthesis seams.
//!
//! The session only talks to [`SpeechGateway`]. [`SynthesisGateway`] is the
//! production implementation: it tries a [`RemoteSynthesizer`] chunk by chunk,
//! plays the result through an [`AudioSink`], and falls back to a
//! [`LocalSynthesizer`] when the remote path fails.

mod gateway;

pub use gateway::{DEFAULT_CHUNK_LIMIT, SynthesisGateway};

use crate::cancellation::CancellationToken;
use crate::error::SynthesisError;
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub language_code: String,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_code: language_code.into(),
        }
    }
}

/// Shared mute switch read by playback while it runs.
#[derive(Debug, Clone, Default)]
pub struct MuteFlag(Arc<AtomicBool>);

impl MuteFlag {
    pub fn set(&self, muted: bool) {
        self.0.store(muted, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// "Speak this, tell me when it is done."
#[async_trait]
pub trait SpeechGateway: Send + Sync {
    /// Resolves when playback has fully ended. Starting a new narration cancels
    /// the one in flight, which then resolves with `SynthesisError::Cancelled`.
    async fn speak(&self, text: &str, language: &str, muted: bool) -> Result<(), SynthesisError>;

    /// Stop whatever is in flight. No-op when idle.
    fn cancel(&self);

    /// Live volume control for backends that support it.
    fn set_muted(&self, _muted: bool) {}
}

/// Length-limited remote service returning encoded audio for one chunk.
#[async_trait]
pub trait RemoteSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> anyhow::Result<Vec<u8>>;
}

/// On-device synthesizer that plays directly.
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    async fn speak(
        &self,
        request: &SynthesisRequest,
        muted: bool,
        cancel: &CancellationToken,
    ) -> Result<(), SynthesisError>;
}

/// Plays an encoded audio payload to completion.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(
        &self,
        audio: Vec<u8>,
        mute: MuteFlag,
        cancel: &CancellationToken,
    ) -> Result<(), SynthesisError>;
}
