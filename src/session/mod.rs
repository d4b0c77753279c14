// Scan session state machine.
//
// This module provides the SessionManager which interprets the worker's
// event stream as transitions of a single scan's lifecycle
// (idle -> running -> {completed | cancelled | failed}) and re-emits typed
// updates to any number of observers over a tokio broadcast channel.

use crate::models::scan::{RequestError, ScanProgress, ScanRequest, Session};
use crate::protocol::message::{Command, Event};
use crate::worker::{WorkerError, WorkerSupervisor};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// Why a scan start was rejected.
#[derive(Error, Debug)]
pub enum StartScanError {
    /// A session is already live; only one scan runs at a time.
    #[error("a scan is already running")]
    AlreadyRunning,

    /// The request failed validation; nothing was sent to the worker.
    #[error("invalid scan request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// The scan command could not reach the worker.
    #[error("failed to reach worker: {0}")]
    Worker(#[from] WorkerError),
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The worker finished the scan. `errors` counts recoverable per-item
    /// failures (0 = clean).
    Completed { summary: String, errors: u64 },
    /// The worker acknowledged a cancel request.
    Cancelled,
    /// The worker process died without reporting a terminal event.
    Failed { message: String },
}

/// Updates emitted to observers as the session progresses.
///
/// These mirror the worker's events one-to-one while a session is running,
/// plus the lifecycle markers `Started` and `Finished`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanUpdate {
    /// A scan request was accepted and sent to the worker.
    Started { request: ScanRequest },
    /// Human-readable phase description.
    Status { message: String },
    /// Freeform worker log line, verbatim.
    Log { message: String },
    /// Progress counter; `total == 0` means still unknown.
    Progress { current: u64, total: u64 },
    /// Advisory diagnostic (worker-reported error or stderr output).
    /// Never terminal by itself.
    Warning { message: String },
    /// The session reached a terminal event and the manager is idle again.
    Finished { outcome: ScanOutcome },
}

/// Read-only snapshot of the session state, for UI initialization.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub running: bool,
    pub cancel_requested: bool,
    pub request: Option<ScanRequest>,
    pub progress: ScanProgress,
    pub last_summary: Option<String>,
}

/// State machine over one scan session at a time.
///
/// The manager is the single writer of the session state. It accepts
/// `start_scan`/`cancel` from the facade, forwards the matching commands
/// through the [`WorkerSupervisor`], and consumes the supervisor's event
/// feed on a background pump task. Observers subscribe to a broadcast
/// channel of [`ScanUpdate`]s; delivery is FIFO per subscriber.
pub struct SessionManager {
    supervisor: Arc<WorkerSupervisor>,
    session: RwLock<Option<Session>>,
    last_summary: RwLock<Option<String>>,
    update_tx: broadcast::Sender<ScanUpdate>,
}

impl SessionManager {
    /// Create a manager and start its event pump.
    ///
    /// Must be called from within a tokio runtime; the pump task runs until
    /// the supervisor's event channel closes.
    pub fn new(supervisor: Arc<WorkerSupervisor>) -> Arc<Self> {
        let (update_tx, _) = broadcast::channel(256);
        let manager = Arc::new(Self {
            supervisor,
            session: RwLock::new(None),
            last_summary: RwLock::new(None),
            update_tx,
        });

        let pump = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut events = pump.supervisor.subscribe();
            loop {
                match events.recv().await {
                    Ok(event) => pump.process_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event feed lagged, {skipped} events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        manager
    }

    /// Subscribe to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanUpdate> {
        self.update_tx.subscribe()
    }

    /// Whether a session is currently live.
    pub fn is_running(&self) -> bool {
        self.session.read().unwrap().is_some()
    }

    /// Snapshot the current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read().unwrap();
        let last_summary = self.last_summary.read().unwrap().clone();
        match session.as_ref() {
            Some(s) => SessionSnapshot {
                running: true,
                cancel_requested: s.cancel_requested,
                request: Some(s.request.clone()),
                progress: s.progress,
                last_summary,
            },
            None => SessionSnapshot {
                last_summary,
                ..SessionSnapshot::default()
            },
        }
    }

    /// Accept a scan request and send it to the worker.
    ///
    /// Rejected synchronously when the request is invalid or a session is
    /// already live; neither case reaches the worker. The session is marked
    /// running before the command is written, and rolled back to idle if
    /// the write fails, so a later attempt can start fresh.
    pub async fn start_scan(&self, request: ScanRequest) -> Result<(), StartScanError> {
        request.validate()?;

        {
            let mut session = self.session.write().unwrap();
            if session.is_some() {
                return Err(StartScanError::AlreadyRunning);
            }
            *session = Some(Session::new(request.clone()));
        }

        if let Err(err) = self.supervisor.send(&request.to_command()).await {
            tracing::warn!("Scan command not delivered, resetting session: {err}");
            *self.session.write().unwrap() = None;
            return Err(err.into());
        }

        tracing::info!(
            "Scan started: {} -> {} (threshold {})",
            request.source,
            request.output,
            request.threshold
        );
        let _ = self.update_tx.send(ScanUpdate::Started { request });
        Ok(())
    }

    /// Request cooperative cancellation of the running scan.
    ///
    /// Returns `true` when a cancel is now pending (idempotent: a repeat
    /// call sends nothing), `false` when no session is live. The worker is
    /// trusted to stop and emit `cancelled`; there is no deadline on the
    /// acknowledgement.
    pub async fn cancel(&self) -> bool {
        {
            let mut session = self.session.write().unwrap();
            match session.as_mut() {
                Some(s) if s.cancel_requested => return true,
                Some(s) => s.cancel_requested = true,
                None => return false,
            }
        }

        tracing::info!("Cancellation requested");
        if let Err(err) = self.supervisor.send(&Command::Cancel).await {
            // The worker is likely dead; its process-exit will end the
            // session through the pump.
            tracing::warn!("Cancel command not delivered: {err}");
        }
        true
    }

    /// Apply one worker event to the session.
    ///
    /// This is the pump task's entry point; it is public so tests can
    /// drive the state machine without a real worker process.
    pub fn process_event(&self, event: Event) {
        match event {
            Event::Status { message } => {
                if self.is_running() {
                    let _ = self.update_tx.send(ScanUpdate::Status { message });
                }
            }
            Event::Log { message } => {
                if self.is_running() {
                    let _ = self.update_tx.send(ScanUpdate::Log { message });
                }
            }
            Event::Progress { current, total } => self.update_progress(current, total),
            Event::Error { message } => {
                // Always surfaced; severity is only known if an exit follows.
                let _ = self.update_tx.send(ScanUpdate::Warning { message });
            }
            Event::Complete { summary, errors } => {
                if self.is_running() {
                    *self.last_summary.write().unwrap() = Some(summary.clone());
                }
                self.finish(ScanOutcome::Completed { summary, errors });
            }
            Event::Cancelled => self.finish(ScanOutcome::Cancelled),
            Event::ProcessExit { code } => {
                if self.is_running() {
                    self.finish(ScanOutcome::Failed {
                        message: format!("worker exited unexpectedly (code {code})"),
                    });
                } else {
                    tracing::debug!("Worker exited with no live session (code {code})");
                }
            }
        }
    }

    fn update_progress(&self, current: u64, total: u64) {
        {
            let mut session = self.session.write().unwrap();
            let Some(s) = session.as_mut() else {
                return;
            };
            // The worker promises monotonic progress; a regression is passed
            // through with a warning rather than asserted on.
            if current < s.progress.current || (s.progress.total != 0 && total < s.progress.total)
            {
                tracing::warn!(
                    current,
                    total,
                    "Progress regressed (was {}/{}), passing through",
                    s.progress.current,
                    s.progress.total
                );
            }
            s.progress = ScanProgress { current, total };
        }
        let _ = self.update_tx.send(ScanUpdate::Progress { current, total });
    }

    /// Clear the session on its first terminal event.
    ///
    /// If the session is already gone a second terminal-shaped event (e.g.
    /// a process exit trailing a complete) is ignored: the first one wins.
    fn finish(&self, outcome: ScanOutcome) {
        let cleared = self.session.write().unwrap().take();
        if cleared.is_none() {
            tracing::debug!("Ignoring terminal event with no live session");
            return;
        }
        tracing::info!("Scan finished: {outcome:?}");
        let _ = self.update_tx.send(ScanUpdate::Finished { outcome });
    }
}
