use super::WorkerError;
use super::channel::WorkerChannel;
use crate::models::ScanSettings;
use crate::protocol::message::{Command, Event};
use camino::Utf8PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::time::timeout;

/// How the supervisor locates and runs the worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Executable names tried in order; the first one wins.
    pub candidates: Vec<String>,
    /// Working directory the worker is spawned in.
    pub working_dir: Utf8PathBuf,
    /// Grace period between a best-effort quit and a forced kill.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_settings(&ScanSettings::default())
    }
}

impl WorkerConfig {
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Self {
            candidates: settings.worker_candidates.clone(),
            working_dir: Utf8PathBuf::from(&settings.worker_dir),
            shutdown_grace: Duration::from_millis(settings.shutdown_grace_ms),
        }
    }

    /// Pick the worker executable name.
    ///
    /// Availability is deliberately not probed here: a missing executable
    /// surfaces as a spawn error when the first command is sent.
    pub fn resolve_program(&self) -> &str {
        self.candidates
            .first()
            .map(String::as_str)
            .unwrap_or("photodup-worker")
    }
}

/// One spawned worker plus the handles the supervisor keeps for it.
struct LiveWorker {
    channel: WorkerChannel,
    kill_tx: Option<oneshot::Sender<()>>,
    exited: watch::Receiver<bool>,
}

impl LiveWorker {
    fn is_live(&self) -> bool {
        !*self.exited.borrow()
    }
}

/// Lazy lifecycle manager for the single scan worker process.
///
/// At most one worker is live per supervisor instance. The supervisor is
/// the sole owner of the process handle: it spawns on demand, forwards
/// commands through the [`WorkerChannel`], and terminates the process
/// gracefully-then-forcefully on [`shutdown`](Self::shutdown).
///
/// The event feed (worker events plus the synthesized `process-exit`) is a
/// broadcast channel that persists across respawns, so observers subscribe
/// once. Each individual worker still emits exactly one `process-exit`.
pub struct WorkerSupervisor {
    config: WorkerConfig,
    live: Mutex<Option<LiveWorker>>,
    event_tx: broadcast::Sender<Event>,
}

impl WorkerSupervisor {
    pub fn new(config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            live: Mutex::new(None),
            event_tx,
        }
    }

    /// Subscribe to the decoded event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether a worker process is currently live.
    pub async fn is_running(&self) -> bool {
        self.live
            .lock()
            .await
            .as_ref()
            .map(LiveWorker::is_live)
            .unwrap_or(false)
    }

    /// Spawn the worker if none is live. Idempotent.
    ///
    /// A handle left over from a worker that exited unexpectedly is
    /// discarded here, so the next use always gets a fresh process rather
    /// than a dead pipe.
    pub async fn ensure_started(&self) -> Result<(), WorkerError> {
        let mut live = self.live.lock().await;

        if let Some(worker) = live.as_ref() {
            if worker.is_live() {
                return Ok(());
            }
            tracing::info!("Previous worker exited, clearing stale handle");
            *live = None;
        }

        let program = self.config.resolve_program();
        tracing::info!("Spawning worker: {program} (cwd: {})", self.config.working_dir);

        let child = tokio::process::Command::new(program)
            .current_dir(self.config.working_dir.as_std_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::Spawn)?;

        let (channel, kill_tx, exited) = WorkerChannel::attach(child, self.event_tx.clone())?;
        *live = Some(LiveWorker {
            channel,
            kill_tx: Some(kill_tx),
            exited,
        });

        Ok(())
    }

    /// Send one command, starting the worker first if needed.
    ///
    /// The very first command issued to an idle supervisor implicitly
    /// spawns the worker.
    pub async fn send(&self, command: &Command) -> Result<(), WorkerError> {
        self.ensure_started().await?;

        let live = self.live.lock().await;
        match live.as_ref() {
            Some(worker) => worker.channel.write(command).await,
            // ensure_started either populated this or errored
            None => Err(WorkerError::ChannelClosed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "no live worker",
            ))),
        }
    }

    /// Terminate the worker: best-effort quit, then force-kill after the
    /// grace deadline.
    ///
    /// The quit write is fire-and-forget by design; the process may already
    /// be unresponsive. Idempotent and safe when no worker is live. Either
    /// path clears the live handle so a later command spawns fresh.
    pub async fn shutdown(&self) {
        let mut live = self.live.lock().await;
        let Some(mut worker) = live.take() else {
            tracing::debug!("Shutdown with no live worker");
            return;
        };
        drop(live);

        if let Err(err) = worker.channel.write(&Command::Quit).await {
            tracing::debug!("Quit command not delivered: {err}");
        }

        let grace = self.config.shutdown_grace;
        if timeout(grace, worker.exited.wait_for(|done| *done))
            .await
            .is_err()
        {
            tracing::warn!("Worker did not exit within {grace:?}, force-killing");
            if let Some(kill_tx) = worker.kill_tx.take() {
                let _ = kill_tx.send(());
            }
            // Reaping a killed process is quick; bound it anyway.
            let _ = timeout(grace, worker.exited.wait_for(|done| *done)).await;
        }

        tracing::info!("Worker shutdown complete");
    }
}
