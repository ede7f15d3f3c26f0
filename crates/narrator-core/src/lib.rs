//! Reading session engine for the page narrator.
//!
//! The crate owns the parts of the reader that coordinate state over time:
//! - `session`: the state machine that tracks the open document, the current
//!   page and whether narration is running, including auto-advance.
//! - `controller`: the task that owns a session and serializes UI commands
//!   against narration completions.
//! - `speech`: the synthesis gateway with its remote/local fallback policy.
//! - `document`: the page provider contract the session consumes.
//!
//! Concrete adapters (HTTP client, audio output, filesystem documents) live in
//! the binary crate.

pub mod cancellation;
pub mod controller;
pub mod document;
pub mod error;
pub mod normalizer;
pub mod session;
pub mod speech;
pub mod text_utils;

#[cfg(test)]
mod test_support;

pub use cancellation::{CancellationExt, CancellationToken};
pub use controller::{SessionCommand, SessionController, SessionEvent};
pub use document::{DocumentHandle, PageProvider, RasterImage};
pub use error::{DocumentLoadError, PageRenderError, SynthesisError};
pub use normalizer::{NarrationNormalizer, NormalizerConfig};
pub use session::{
    NarrationOutcome, Notice, ReaderSnapshot, ReadingSession, SessionOptions, SessionState,
};
pub use speech::{
    AudioSink, LocalSynthesizer, MuteFlag, RemoteSynthesizer, SpeechGateway, SynthesisGateway,
    SynthesisRequest,
};
