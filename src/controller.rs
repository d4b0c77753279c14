// Controller facade consumed by the external UI collaborator.
//
// Folder selection happens elsewhere; scan start/cancel and event
// subscription flow through here into the supervisor and the session
// state machine. Nothing in this layer crashes the caller: rejections
// come back as booleans and everything else as updates on the feed.

use crate::models::ScanRequest;
use crate::session::{ScanUpdate, SessionManager, SessionSnapshot};
use crate::worker::{WorkerConfig, WorkerSupervisor};
use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The boundary between the UI shell and the scan machinery.
///
/// Cheap to clone handles out of via [`subscribe`](Self::subscribe);
/// multiple independent observers (UI plus test harness) each get their
/// own FIFO feed.
pub struct ScanController {
    supervisor: Arc<WorkerSupervisor>,
    sessions: Arc<SessionManager>,
}

impl ScanController {
    /// Wire up a supervisor and session manager for one worker process.
    ///
    /// Must be called from within a tokio runtime (the session event pump
    /// is spawned here). The worker itself is not started until the first
    /// scan is submitted.
    pub fn new(config: WorkerConfig) -> Self {
        let supervisor = Arc::new(WorkerSupervisor::new(config));
        let sessions = SessionManager::new(Arc::clone(&supervisor));
        Self {
            supervisor,
            sessions,
        }
    }

    /// Submit a scan. Returns whether it was accepted.
    ///
    /// Rejection (invalid request, scan already running, worker
    /// unreachable) is a logged no-op from the caller's point of view.
    pub async fn start_scan(
        &self,
        source: Utf8PathBuf,
        output: Utf8PathBuf,
        threshold: u32,
    ) -> bool {
        let request = ScanRequest {
            source,
            output,
            threshold,
        };
        match self.sessions.start_scan(request).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Scan request rejected: {err}");
                false
            }
        }
    }

    /// Request cancellation of the running scan. Returns whether a cancel
    /// is now pending.
    pub async fn cancel_scan(&self) -> bool {
        self.sessions.cancel().await
    }

    /// Subscribe to the session update feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanUpdate> {
        self.sessions.subscribe()
    }

    /// Snapshot of the current session, for initializing an observer.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.sessions.snapshot()
    }

    /// Whether a scan session is currently live.
    pub fn is_scanning(&self) -> bool {
        self.sessions.is_running()
    }

    /// Terminate the worker process (graceful quit, forced kill after the
    /// grace deadline). Safe to call at any time.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}
