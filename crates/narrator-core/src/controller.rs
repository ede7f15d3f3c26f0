//! Actor that owns a [`ReadingSession`] and serializes access to it.
//!
//! UI commands and narration completions are both funneled through one task,
//! so the session's state is only ever touched by a single handler at a time.

use crate::document::DocumentHandle;
use crate::session::{Notice, ReaderSnapshot, ReadingSession};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_QUEUE: usize = 32;
const EVENT_CAPACITY: usize = 64;
const LOADING_ACTION: &str = "session_loading";
const NARRATION_STEP_ACTION: &str = "session_narration_step";

#[derive(Debug)]
pub enum SessionCommand {
    GetSnapshot,
    Open { document: DocumentHandle },
    Close,
    GoToPage { page: usize },
    NextPage,
    PreviousPage,
    ToggleReading,
    ToggleMute,
}

impl SessionCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "session_get_snapshot",
            Self::Open { .. } => "session_open",
            Self::Close => "session_close",
            Self::GoToPage { .. } => "session_go_to_page",
            Self::NextPage => "session_next_page",
            Self::PreviousPage => "session_previous_page",
            Self::ToggleReading => "session_toggle_reading",
            Self::ToggleMute => "session_toggle_mute",
        }
    }
}

/// Published after every state-changing command and every narration step.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub action: &'static str,
    pub snapshot: ReaderSnapshot,
    pub notices: Vec<Notice>,
}

struct Envelope {
    command: SessionCommand,
    reply: oneshot::Sender<ReaderSnapshot>,
}

pub struct SessionController {
    commands: mpsc::Sender<Envelope>,
    events: broadcast::Sender<SessionEvent>,
    snapshot: watch::Receiver<ReaderSnapshot>,
    worker: JoinHandle<Vec<Notice>>,
}

impl SessionController {
    /// Move `session` onto a tokio task. Must be called inside a runtime.
    pub fn spawn(session: ReadingSession) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(session.snapshot());
        let outbox = Outbox {
            events: events.clone(),
            snapshot_tx,
        };
        let worker = tokio::spawn(run_session(session, receiver, outbox));
        Self {
            commands,
            events,
            snapshot,
            worker,
        }
    }

    /// Send `command` and wait for the snapshot taken right after it applied.
    pub async fn dispatch(&self, command: SessionCommand) -> ReaderSnapshot {
        let action = command.action();
        let (reply, response) = oneshot::channel();
        if self.commands.send(Envelope { command, reply }).await.is_err() {
            warn!(action, "Session worker is gone; returning last known snapshot");
            return self.snapshot();
        }
        match response.await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!(action, "Session worker dropped the command");
                self.snapshot()
            }
        }
    }

    pub async fn open(&self, location: impl Into<PathBuf>) -> ReaderSnapshot {
        let document = DocumentHandle::open(location);
        self.dispatch(SessionCommand::Open { document }).await
    }

    pub async fn close(&self) -> ReaderSnapshot {
        self.dispatch(SessionCommand::Close).await
    }

    pub async fn go_to_page(&self, page: usize) -> ReaderSnapshot {
        self.dispatch(SessionCommand::GoToPage { page }).await
    }

    pub async fn next_page(&self) -> ReaderSnapshot {
        self.dispatch(SessionCommand::NextPage).await
    }

    pub async fn previous_page(&self) -> ReaderSnapshot {
        self.dispatch(SessionCommand::PreviousPage).await
    }

    pub async fn toggle_reading(&self) -> ReaderSnapshot {
        self.dispatch(SessionCommand::ToggleReading).await
    }

    pub async fn toggle_mute(&self) -> ReaderSnapshot {
        self.dispatch(SessionCommand::ToggleMute).await
    }

    /// Latest published snapshot, without a round trip to the worker.
    pub fn snapshot(&self) -> ReaderSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<ReaderSnapshot> {
        self.snapshot.clone()
    }

    /// Close the session, stop the worker, and return the notices it produced
    /// while closing.
    pub async fn shutdown(self) -> Vec<Notice> {
        let Self {
            commands, worker, ..
        } = self;
        drop(commands);
        match worker.await {
            Ok(notices) => notices,
            Err(err) => {
                warn!(error = %err, "Session worker did not stop cleanly");
                Vec::new()
            }
        }
    }
}

/// Where the worker publishes snapshots and events.
struct Outbox {
    events: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<ReaderSnapshot>,
}

impl Outbox {
    fn publish(&self, session: &mut ReadingSession, action: &'static str) -> ReaderSnapshot {
        let snapshot = session.snapshot();
        let notices = session.drain_notices();
        self.snapshot_tx.send_replace(snapshot.clone());
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent {
            action,
            snapshot: snapshot.clone(),
            notices,
        });
        snapshot
    }
}

async fn run_session(
    mut session: ReadingSession,
    mut commands: mpsc::Receiver<Envelope>,
    outbox: Outbox,
) -> Vec<Notice> {
    info!("Session worker started");
    loop {
        tokio::select! {
            biased;
            envelope = commands.recv() => {
                let Some(Envelope { command, reply }) = envelope else {
                    break;
                };
                let action = command.action();
                debug!(action, "Handling session command");
                let snapshot = if matches!(command, SessionCommand::GetSnapshot) {
                    session.snapshot()
                } else {
                    apply(&mut session, command, &outbox).await;
                    outbox.publish(&mut session, action)
                };
                if reply.send(snapshot).is_err() {
                    debug!(action, "Caller went away before the reply");
                }
            }
            outcome = session.next_narration_outcome() => {
                session.finish_narration(outcome).await;
                outbox.publish(&mut session, NARRATION_STEP_ACTION);
            }
        }
    }

    session.close();
    outbox.snapshot_tx.send_replace(session.snapshot());
    info!("Session worker stopped");
    session.drain_notices()
}

async fn apply(session: &mut ReadingSession, command: SessionCommand, outbox: &Outbox) {
    match command {
        SessionCommand::GetSnapshot => {}
        SessionCommand::Open { document } => {
            session.begin_open(document);
            outbox.publish(session, LOADING_ACTION);
            session.finish_open().await;
        }
        SessionCommand::Close => session.close(),
        SessionCommand::GoToPage { page } => {
            session.go_to_page(page).await;
        }
        SessionCommand::NextPage => {
            session.next_page().await;
        }
        SessionCommand::PreviousPage => {
            session.previous_page().await;
        }
        SessionCommand::ToggleReading => session.toggle_reading(),
        SessionCommand::ToggleMute => session.toggle_mute(),
    }
}
