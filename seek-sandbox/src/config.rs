//! Execution core configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables for the execution core. Defaults are safe for a small host;
/// every field can be overridden through `SEEK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum number of concurrently live sandboxes.
    pub max_concurrency: usize,

    /// Submissions allowed to wait for a slot before new ones are rejected.
    pub max_queue_depth: usize,

    /// Largest accepted code payload, bytes.
    pub max_code_bytes: usize,

    /// Largest accepted stdin payload, bytes.
    pub max_stdin_bytes: usize,

    /// Directory under which per-submission scratch dirs are created.
    pub scratch_root: PathBuf,

    /// Ring capacity of the in-memory execution history.
    pub history_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            max_queue_depth: 32,
            max_code_bytes: 64 * 1024,
            max_stdin_bytes: 64 * 1024,
            scratch_root: std::env::temp_dir().join("seek-exec"),
            history_capacity: 1000,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `SEEK_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("SEEK_MAX_CONCURRENCY") {
            config.max_concurrency = v.max(1);
        }
        if let Some(v) = env_usize("SEEK_MAX_QUEUE_DEPTH") {
            config.max_queue_depth = v;
        }
        if let Some(v) = env_usize("SEEK_MAX_CODE_BYTES") {
            config.max_code_bytes = v;
        }
        if let Some(v) = env_usize("SEEK_MAX_STDIN_BYTES") {
            config.max_stdin_bytes = v;
        }
        if let Some(v) = env_usize("SEEK_HISTORY_CAPACITY") {
            config.history_capacity = v;
        }
        if let Ok(v) = std::env::var("SEEK_SCRATCH_ROOT") {
            if !v.is_empty() {
                config.scratch_root = PathBuf::from(v);
            }
        }
        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}
