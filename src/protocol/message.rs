use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Exit code reported in [`Event::ProcessExit`] when the worker was killed
/// or its status code is unavailable.
pub const KILLED_EXIT_CODE: i32 = -1;

/// A command sent from the controller to the worker.
///
/// Serialized as one JSON object with a `cmd` discriminator, e.g.
/// `{"cmd":"scan","source":"/a","output":"/b","threshold":15}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    /// Start a duplicate scan of `source`, copying duplicates to `output`.
    Scan {
        source: Utf8PathBuf,
        output: Utf8PathBuf,
        threshold: u32,
    },
    /// Request cooperative cancellation of the running scan.
    Cancel,
    /// Ask the worker to exit.
    Quit,
}

/// An event received from the worker, or synthesized by the supervisor.
///
/// Serialized as one JSON object with an `event` discriminator.
/// `process-exit` is never sent by the worker itself; the supervisor
/// synthesizes exactly one when the worker process terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    /// Human-readable phase description; implies only "still running".
    Status { message: String },
    /// Freeform progress/diagnostic line, passed through verbatim.
    Log { message: String },
    /// Progress counter; `total` may be 0 while still unknown.
    Progress { current: u64, total: u64 },
    /// Terminal success. `errors` counts recoverable per-item failures.
    Complete { summary: String, errors: u64 },
    /// Terminal acknowledgement of a prior cancel command.
    Cancelled,
    /// Worker-reported or stderr-derived diagnostic. Advisory on its own;
    /// only a following process exit makes it fatal.
    Error { message: String },
    /// Supervisor-synthesized: the worker process terminated.
    ProcessExit { code: i32 },
}

impl Event {
    /// Whether this event ends a scan session.
    ///
    /// `Error` is deliberately not terminal: severity is inferred only by
    /// whether a `ProcessExit` follows.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Complete { .. } | Event::Cancelled | Event::ProcessExit { .. }
        )
    }
}
