//! Data models for the PhotoDup supervisor.
//!
//! - [`ScanRequest`]: one validated scan submission (source, output, threshold)
//! - [`ScanProgress`] / [`Session`]: live state of the single in-flight scan
//! - [`UserConfig`]: user preferences and worker settings loaded from YAML
//!
//! `ScanRequest` is immutable once submitted; the live [`Session`] has a
//! single writer, the [`SessionManager`](crate::session::SessionManager).

pub mod config;
pub mod scan;

pub use config::{ScanSettings, UserConfig};
pub use scan::{
    DEFAULT_THRESHOLD, MAX_THRESHOLD, MIN_THRESHOLD, RequestError, ScanProgress, ScanRequest,
    Session,
};
