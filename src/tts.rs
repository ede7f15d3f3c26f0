//! Speech backends: audio playback through `rodio` and the on-device
//! synthesizer program used as the local fallback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use narrator_core::{
    AudioSink, CancellationExt, CancellationToken, LocalSynthesizer, MuteFlag, SynthesisError,
    SynthesisRequest,
};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::process::Stdio;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const PLAYBACK_POLL: Duration = Duration::from_millis(50);

/// Plays encoded audio (MP3, WAV, ...) on the default output device.
///
/// Playback runs on one dedicated thread that keeps the output stream open
/// between pages.
pub struct RodioSink {
    volume: f32,
    jobs: mpsc::Sender<PlaybackJob>,
}

struct PlaybackJob {
    audio: Vec<u8>,
    volume: f32,
    mute: MuteFlag,
    cancel: CancellationToken,
    done: oneshot::Sender<Result<bool>>,
}

impl RodioSink {
    pub fn new(volume: f32) -> Result<Self> {
        let (jobs, queue) = mpsc::channel();
        thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || run_playback(queue))
            .context("Starting playback thread")?;
        Ok(Self { volume, jobs })
    }
}

#[async_trait]
impl AudioSink for RodioSink {
    async fn play(
        &self,
        audio: Vec<u8>,
        mute: MuteFlag,
        cancel: &CancellationToken,
    ) -> Result<(), SynthesisError> {
        cancel.check_cancelled()?;
        let (done, finished) = oneshot::channel();
        let job = PlaybackJob {
            audio,
            volume: self.volume,
            mute,
            cancel: cancel.clone(),
            done,
        };
        self.jobs
            .send(job)
            .map_err(|_| SynthesisError::Playback("playback thread stopped".to_string()))?;
        let finished = finished
            .await
            .map_err(|_| SynthesisError::Playback("playback thread dropped the job".to_string()))?
            .map_err(|err| SynthesisError::Playback(format!("{err:#}")))?;
        if finished {
            Ok(())
        } else {
            Err(SynthesisError::Cancelled)
        }
    }
}

/// Open output device, created on first use and kept until it fails.
#[derive(Default)]
struct Output {
    stream: Option<(OutputStream, OutputStreamHandle)>,
}

impl Output {
    fn sink(&mut self) -> Result<Sink> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let opened = OutputStream::try_default().context("Opening audio output")?;
                info!("Opened audio output");
                opened
            }
        };
        // On failure the stream is dropped and reopened for the next page.
        let sink = Sink::try_new(&stream.1).context("Creating sink")?;
        self.stream = Some(stream);
        Ok(sink)
    }
}

fn run_playback(queue: mpsc::Receiver<PlaybackJob>) {
    let mut output = Output::default();
    while let Ok(job) = queue.recv() {
        let PlaybackJob {
            audio,
            volume,
            mute,
            cancel,
            done,
        } = job;
        let result = play_job(&mut output, audio, volume, &mute, &cancel);
        if done.send(result).is_err() {
            debug!("Playback caller went away");
        }
    }
    debug!("Playback thread stopped");
}

/// Returns `false` when playback was cut short by cancellation.
fn play_job(
    output: &mut Output,
    audio: Vec<u8>,
    volume: f32,
    mute: &MuteFlag,
    cancel: &CancellationToken,
) -> Result<bool> {
    if cancel.is_cancelled() {
        debug!("Skipping playback cancelled while queued");
        return Ok(false);
    }
    let bytes = audio.len();
    let source = Decoder::new(Cursor::new(audio)).context("Decoding synthesized audio")?;
    let sink = output.sink()?;

    let mut muted = mute.is_muted();
    sink.set_volume(effective_volume(volume, muted));
    sink.append(source);
    sink.play();
    info!(bytes, muted, "Starting playback");

    while !sink.empty() {
        if cancel.is_cancelled() {
            debug!("Stopping playback on cancel");
            sink.stop();
            return Ok(false);
        }
        let now_muted = mute.is_muted();
        if now_muted != muted {
            muted = now_muted;
            sink.set_volume(effective_volume(volume, muted));
            debug!(muted, "Applied mute change to playback");
        }
        thread::sleep(PLAYBACK_POLL);
    }

    debug!("Playback finished");
    Ok(true)
}

fn effective_volume(volume: f32, muted: bool) -> f32 {
    if muted { 0.0 } else { volume }
}

/// Local fallback: an espeak-compatible program that reads text on stdin and
/// speaks it directly.
pub struct CommandSynthesizer {
    program: String,
    rate: u32,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, rate: u32) -> Self {
        Self {
            program: program.into(),
            rate,
        }
    }

    fn args(&self, language: &str, muted: bool) -> Vec<String> {
        let mut args = vec![
            "-v".to_string(),
            language.to_ascii_lowercase(),
            "-s".to_string(),
            self.rate.to_string(),
        ];
        if muted {
            args.extend(["-a".to_string(), "0".to_string()]);
        }
        args
    }
}

#[async_trait]
impl LocalSynthesizer for CommandSynthesizer {
    async fn speak(
        &self,
        request: &SynthesisRequest,
        muted: bool,
        cancel: &CancellationToken,
    ) -> Result<(), SynthesisError> {
        cancel.check_cancelled()?;
        let args = self.args(&request.language_code, muted);
        debug!(program = %self.program, ?args, chars = request.text.len(), "Starting local synthesizer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SynthesisError::Local(format!("failed to start {}: {err}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.text.as_bytes())
                .await
                .map_err(|err| SynthesisError::Local(format!("failed to send text: {err}")))?;
            // Closing stdin lets the program start speaking.
            drop(stdin);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(err) = child.kill().await {
                    warn!(program = %self.program, "Failed to stop local synthesizer: {err}");
                }
                debug!(program = %self.program, "Local synthesizer cancelled");
                Err(SynthesisError::Cancelled)
            }
            status = child.wait() => {
                let status = status.map_err(|err| {
                    SynthesisError::Local(format!("failed to wait for {}: {err}", self.program))
                })?;
                if status.success() {
                    Ok(())
                } else {
                    Err(SynthesisError::Local(format!("{} exited with {status}", self.program)))
                }
            }
        }
    }
}
