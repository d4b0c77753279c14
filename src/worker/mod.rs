//! Worker process ownership: spawning, stream plumbing, and termination.
//!
//! [`WorkerSupervisor`] is the only component allowed to spawn or kill the
//! worker process. [`WorkerChannel`] owns the three piped standard streams
//! of one process instance and turns its stdout/stderr into a single
//! decoded event feed.
//!
//! None of the errors here are fatal to the supervising process: a failed
//! write or spawn is reported to the caller, the live-worker reference is
//! cleared, and the next command triggers a fresh spawn.

pub mod channel;
pub mod supervisor;

pub use channel::WorkerChannel;
pub use supervisor::{WorkerConfig, WorkerSupervisor};

use thiserror::Error;

/// Errors from the worker plumbing layer.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker executable could not be started.
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    /// A stream that should have been piped was not available.
    #[error("worker {0} stream not piped")]
    StreamUnavailable(&'static str),

    /// A write to the worker's stdin failed: the process was never
    /// started, already exited, or the pipe broke.
    #[error("worker channel closed: {0}")]
    ChannelClosed(#[source] std::io::Error),
}
