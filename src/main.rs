//! Entry point for the page narrator.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration (default `conf/config.toml`).
//! - Wire the filesystem provider and speech backends into a session.
//! - Drive the session from stdin commands until quit, EOF or Ctrl-C.

mod cache;
mod config;
mod console;
mod document;
mod pagination;
mod remote;
mod tts;

use crate::cache::{ProgressStore, ReadingProgress};
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH, load_config};
use crate::console::{ConsoleCommand, HELP, describe_notice, parse_line, status_line};
use crate::document::FsPageProvider;
use crate::remote::CloudTtsClient;
use crate::tts::{CommandSynthesizer, RodioSink};
use anyhow::{Context, Result, anyhow};
use narrator_core::{
    NarrationNormalizer, Notice, ReadingSession, SessionController, SessionEvent, SessionOptions,
    SessionState, SynthesisGateway,
};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: page-narrator [--config <path>] [--resume] <document>";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    config_path: PathBuf,
    resume: bool,
    document: PathBuf,
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = load_config(&args.config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %args.document.display(),
        level = %config.log_level,
        language = %config.language,
        "Starting page narrator"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Starting async runtime")?;
    let result = runtime.block_on(run_reader(config, args));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();
    result
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut resume = false;
    let mut document = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config needs a path\n{USAGE}"))?;
                config_path = PathBuf::from(path);
            }
            "--resume" => resume = true,
            "-h" | "--help" => return Err(anyhow!(USAGE)),
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown flag {flag}\n{USAGE}")),
            path => {
                if document.replace(PathBuf::from(path)).is_some() {
                    return Err(anyhow!("Only one document can be opened\n{USAGE}"));
                }
            }
        }
    }

    let document = document.ok_or_else(|| anyhow!(USAGE))?;
    Ok(CliArgs {
        config_path,
        resume,
        document,
    })
}

async fn run_reader(config: AppConfig, args: CliArgs) -> Result<()> {
    let document = resolve_document(&args.document)?;
    let progress = ProgressStore::new(&config.cache_dir);
    let last_read = progress.load(&document);
    if let Some(last) = &last_read {
        info!(
            page = last.page,
            total_pages = last.total_pages,
            percent = last.percent,
            "Found previous reading position"
        );
    }

    let controller = SessionController::spawn(build_session(&config)?);
    let printer = spawn_event_printer(&controller, progress.clone());
    let mut interrupts = install_interrupt_handler();

    let snapshot = controller.open(&document).await;
    let resume_page = last_read
        .filter(|last| args.resume && last.page > 1 && snapshot.state == SessionState::Ready)
        .map(|last| last.page);
    if let Some(page) = resume_page {
        info!(page, "Resuming from saved page");
        controller.go_to_page(page).await;
    }
    println!("Type h for help.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = interrupts.recv() => {
                info!("Interrupted; closing session");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("Standard input closed; waiting for narration to finish");
                        wait_until_idle(&controller, &mut interrupts).await;
                        break;
                    }
                    Err(err) => {
                        warn!("Failed to read standard input: {err}");
                        break;
                    }
                };
                match parse_line(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => execute(&controller, command).await,
                    Ok(None) => {}
                    Err(err) => println!("{err}"),
                }
            }
        }
    }

    for notice in controller.shutdown().await {
        report_notice(&notice, &progress);
    }
    if let Err(err) = printer.await {
        warn!("Event printer stopped abnormally: {err}");
    }
    info!("Goodbye");
    Ok(())
}

fn resolve_document(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    path.canonicalize()
        .with_context(|| format!("Resolving {}", path.display()))
}

fn build_session(config: &AppConfig) -> Result<ReadingSession> {
    let provider = Arc::new(FsPageProvider::new(
        config.text_chars_per_line,
        config.text_lines_per_page,
    ));
    let local = Arc::new(CommandSynthesizer::new(
        config.local_tts_command.clone(),
        config.local_tts_rate,
    ));
    let sink = Arc::new(RodioSink::new(config.playback_volume)?);
    let mut gateway =
        SynthesisGateway::new(local, sink).with_chunk_limit(config.remote_tts_chunk_bytes);

    match (config.remote_tts_enabled, config.remote_api_key()) {
        (true, Some(api_key)) => {
            let client = CloudTtsClient::new(
                config.remote_tts_endpoint.clone(),
                api_key,
                config.remote_tts_voice.clone(),
                config.remote_tts_speaking_rate,
            )?;
            gateway = gateway.with_remote(Arc::new(client));
            info!(
                endpoint = %config.remote_tts_endpoint,
                chunk_bytes = config.remote_tts_chunk_bytes,
                "Remote synthesis enabled"
            );
        }
        (true, None) => warn!(
            env = %config.remote_tts_api_key_env,
            "No remote synthesis API key configured; using {} only",
            config.local_tts_command
        ),
        (false, _) => info!(
            "Remote synthesis disabled; using {} only",
            config.local_tts_command
        ),
    }

    let options = SessionOptions {
        language: config.language.clone(),
        normalizer: NarrationNormalizer::new(config.normalization.clone()),
    };
    Ok(ReadingSession::new(provider, Arc::new(gateway), options))
}

fn spawn_event_printer(
    controller: &SessionController,
    progress: ProgressStore,
) -> tokio::task::JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, &progress),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped session events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &SessionEvent, progress: &ProgressStore) {
    debug!(action = event.action, "Session event");
    println!("{}", status_line(&event.snapshot));
    for notice in &event.notices {
        report_notice(notice, progress);
    }
}

fn report_notice(notice: &Notice, progress: &ProgressStore) {
    println!("! {}", describe_notice(notice));
    if let Notice::Closed {
        location,
        page,
        total_pages,
    } = notice
    {
        match progress.save(location, &ReadingProgress::new(*page, *total_pages)) {
            Ok(()) => info!(page, total_pages, "Recorded reading progress"),
            Err(err) => warn!("Failed to record reading progress: {err:#}"),
        }
    }
}

async fn execute(controller: &SessionController, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Next => {
            controller.next_page().await;
        }
        ConsoleCommand::Previous => {
            controller.previous_page().await;
        }
        ConsoleCommand::GoTo(page) => {
            controller.go_to_page(page).await;
        }
        ConsoleCommand::ToggleReading => {
            controller.toggle_reading().await;
        }
        ConsoleCommand::ToggleMute => {
            controller.toggle_mute().await;
        }
        ConsoleCommand::Status => println!("{}", status_line(&controller.snapshot())),
        ConsoleCommand::Open(path) => match resolve_document(&path) {
            Ok(path) => {
                controller.open(path).await;
            }
            Err(err) => println!("{err}"),
        },
        ConsoleCommand::Close => {
            controller.close().await;
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
}

/// Keep narrating after stdin ends (e.g. piped commands) until reading stops.
async fn wait_until_idle(controller: &SessionController, interrupts: &mut mpsc::UnboundedReceiver<()>) {
    let mut snapshots = controller.watch();
    tokio::select! {
        _ = interrupts.recv() => info!("Interrupted; closing session"),
        _ = snapshots.wait_for(|snapshot| !snapshot.is_reading) => {}
    }
}

fn install_interrupt_handler() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        warn!("Failed to install Ctrl-C handler: {err}");
    }
    rx
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    debug!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
