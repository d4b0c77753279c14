use super::WorkerError;
use crate::protocol::framing;
use crate::protocol::message::{Command, Event, KILLED_EXIT_CODE};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{Mutex, broadcast, oneshot, watch};

/// Owns the standard streams of one spawned worker process.
///
/// The channel writes encoded commands to the worker's stdin and runs three
/// background tasks for the lifetime of the process:
///
/// - a stdout reader that decodes one event per line, dropping lines that
///   fail framing;
/// - a stderr reader that forwards raw diagnostic chunks as `error` events;
/// - a wait task that owns the [`Child`], synthesizes exactly one
///   `process-exit` event when it terminates, and handles force-kill
///   requests.
///
/// Once the process has exited the channel never emits again.
pub struct WorkerChannel {
    stdin: Mutex<tokio::process::ChildStdin>,
    event_tx: broadcast::Sender<Event>,
}

impl WorkerChannel {
    /// Take over the piped streams of a freshly spawned child.
    ///
    /// Returns the channel, a one-shot force-kill trigger, and a watch flag
    /// that flips to `true` once the process has been reaped. The caller
    /// (the supervisor) keeps the trigger and the flag; it must not touch
    /// the process by any other means.
    pub fn attach(
        mut child: Child,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<(Self, oneshot::Sender<()>, watch::Receiver<bool>), WorkerError> {
        let stdin = child
            .stdin
            .take()
            .ok_or(WorkerError::StreamUnavailable("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(WorkerError::StreamUnavailable("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(WorkerError::StreamUnavailable("stderr"))?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);

        tokio::spawn(read_stdout(stdout, event_tx.clone()));
        tokio::spawn(read_stderr(stderr, event_tx.clone()));
        tokio::spawn(wait_for_exit(child, kill_rx, exited_tx, event_tx.clone()));

        Ok((
            Self {
                stdin: Mutex::new(stdin),
                event_tx,
            },
            kill_tx,
            exited_rx,
        ))
    }

    /// Encode and write one command line to the worker's stdin.
    ///
    /// Writes are serialized behind a mutex: the protocol has no message
    /// IDs, so callers must issue one command at a time. A failed write is
    /// reported as [`WorkerError::ChannelClosed`], never a crash.
    pub async fn write(&self, command: &Command) -> Result<(), WorkerError> {
        let line = framing::encode(command);
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(WorkerError::ChannelClosed)?;
        stdin.flush().await.map_err(WorkerError::ChannelClosed)?;
        Ok(())
    }

    /// Subscribe to the decoded event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

/// Read the worker's stdout line by line, forwarding decoded events in
/// arrival order. Lines that fail framing are dropped, not fatal.
async fn read_stdout(stdout: ChildStdout, event_tx: broadcast::Sender<Event>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match framing::decode(&line) {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(err) => {
                    tracing::trace!("Dropping unframed stdout line: {err}");
                }
            },
            Ok(None) => break,
            Err(err) => {
                tracing::debug!("Worker stdout read failed: {err}");
                break;
            }
        }
    }
}

/// Forward raw stderr chunks as diagnostic `error` events.
///
/// This is a pass-through channel distinct from the worker's own
/// JSON-encoded `error` events; both reach subscribers the same way.
async fn read_stderr(mut stderr: ChildStderr, event_tx: broadcast::Sender<Event>) {
    let mut buf = vec![0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let message = text.trim();
                if !message.is_empty() {
                    let _ = event_tx.send(Event::Error {
                        message: message.to_string(),
                    });
                }
            }
            Err(err) => {
                tracing::debug!("Worker stderr read failed: {err}");
                break;
            }
        }
    }
}

/// Own the child until it terminates, then emit exactly one
/// `process-exit` event and flip the exited flag.
///
/// A force-kill request through `kill_rx` kills the process and reaps it;
/// the sentinel code is reported when no status code is available (killed
/// by signal). Dropping the sender without a request just reaps normally.
async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exited_tx: watch::Sender<bool>,
    event_tx: broadcast::Sender<Event>,
) {
    let code = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => status.code().unwrap_or(KILLED_EXIT_CODE),
            Err(err) => {
                tracing::warn!("Failed to reap worker process: {err}");
                KILLED_EXIT_CODE
            }
        },
        requested = kill_rx => {
            if requested.is_ok() {
                tracing::warn!("Force-killing worker process");
                if let Err(err) = child.start_kill() {
                    tracing::debug!("Kill request failed (already dead?): {err}");
                }
            }
            match child.wait().await {
                Ok(status) => status.code().unwrap_or(KILLED_EXIT_CODE),
                Err(_) => KILLED_EXIT_CODE,
            }
        }
    };

    tracing::info!("Worker process exited with code {code}");
    let _ = event_tx.send(Event::ProcessExit { code });
    let _ = exited_tx.send(true);
}
