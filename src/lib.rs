// PhotoDup - Process supervisor and scan session protocol for the
// duplicate photo finder worker.
//
// This is the library crate containing the supervisor core. The binary
// crate (main.rs) provides a headless console shell standing in for the
// external UI collaborator.

pub mod config;
pub mod controller;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod session;
pub mod worker;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use controller::ScanController;
pub use models::{ScanProgress, ScanRequest, UserConfig};
pub use protocol::{Command, Event};
pub use session::{ScanOutcome, ScanUpdate, SessionManager, StartScanError};
pub use worker::{WorkerConfig, WorkerError, WorkerSupervisor};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
