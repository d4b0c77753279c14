use serde::{Deserialize, Serialize};

use super::scan::DEFAULT_THRESHOLD;

/// User configuration from PhotoDup Config.yaml
///
/// Contains worker process settings and user preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "PhotoDup_Settings")]
    pub settings: ScanSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Worker executable names tried in order. The first name is used
    /// as-is; availability is not verified up front, so a missing
    /// executable surfaces as a spawn error on first use.
    #[serde(rename = "Worker Candidates", default = "default_worker_candidates")]
    pub worker_candidates: Vec<String>,

    /// Working directory the worker is spawned in.
    #[serde(rename = "Worker Directory", default = "default_worker_dir")]
    pub worker_dir: String,

    /// Grace period in milliseconds between a best-effort quit command and
    /// a forced kill during shutdown.
    #[serde(rename = "Shutdown Grace Ms", default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Similarity threshold used when the caller does not supply one.
    #[serde(rename = "Default Threshold", default = "default_threshold")]
    pub default_threshold: u32,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            worker_candidates: default_worker_candidates(),
            worker_dir: default_worker_dir(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            default_threshold: default_threshold(),
            debug_mode: false,
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            settings: ScanSettings::default(),
        }
    }
}

fn default_worker_candidates() -> Vec<String> {
    vec![
        "photodup-worker".to_string(),
        "photodup-worker.exe".to_string(),
    ]
}

fn default_worker_dir() -> String {
    ".".to_string()
}

fn default_shutdown_grace_ms() -> u64 {
    1000
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}
