use crate::protocol::Command;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest accepted similarity threshold.
pub const MIN_THRESHOLD: u32 = 1;

/// Highest accepted similarity threshold.
pub const MAX_THRESHOLD: u32 = 60;

/// Default perceptual-hash similarity threshold.
pub const DEFAULT_THRESHOLD: u32 = 20;

/// Reasons a scan request is rejected before anything is sent to the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("source and output folders cannot be the same")]
    SamePaths,

    #[error("threshold {0} is outside {MIN_THRESHOLD}..={MAX_THRESHOLD}")]
    ThresholdOutOfRange(u32),
}

/// One user-initiated scan submission.
///
/// Immutable once submitted; owned by the supervisor side for the duration
/// of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Folder to scan recursively for images.
    pub source: Utf8PathBuf,
    /// Folder duplicates are copied into. Must differ from `source`.
    pub output: Utf8PathBuf,
    /// Perceptual-hash distance threshold, `1..=60`.
    pub threshold: u32,
}

impl ScanRequest {
    /// Build a validated request.
    pub fn new(
        source: impl Into<Utf8PathBuf>,
        output: impl Into<Utf8PathBuf>,
        threshold: u32,
    ) -> Result<Self, RequestError> {
        let request = Self {
            source: source.into(),
            output: output.into(),
            threshold,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check the request invariants: distinct paths, bounded threshold.
    ///
    /// Paths are compared textually; the core does not touch the
    /// filesystem to canonicalize them.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source == self.output {
            return Err(RequestError::SamePaths);
        }
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&self.threshold) {
            return Err(RequestError::ThresholdOutOfRange(self.threshold));
        }
        Ok(())
    }

    /// The wire command that starts this scan.
    pub fn to_command(&self) -> Command {
        Command::Scan {
            source: self.source.clone(),
            output: self.output.clone(),
            threshold: self.threshold,
        }
    }
}

/// Progress counter as last reported by the worker.
///
/// `total == 0` means the worker has not yet determined the amount of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub current: u64,
    pub total: u64,
}

impl ScanProgress {
    /// Fraction complete in `[0, 1]`, or `None` while the total is unknown.
    ///
    /// Clamped so a worker over-reporting `current` can never produce a
    /// value above 1.
    pub fn percent(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.current as f64 / self.total as f64).clamp(0.0, 1.0))
    }
}

/// The aggregate over one accepted scan request's execution.
///
/// Exactly one `Session` is live at a time; it is created when a scan
/// command is accepted and destroyed on the first terminal event.
#[derive(Debug, Clone)]
pub struct Session {
    pub request: ScanRequest,
    pub progress: ScanProgress,
    pub cancel_requested: bool,
}

impl Session {
    pub fn new(request: ScanRequest) -> Self {
        Self {
            request,
            progress: ScanProgress::default(),
            cancel_requested: false,
        }
    }
}
