//! Resource limits applied to sandboxed execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource ceilings for one sandboxed submission.
///
/// Wall-clock deadlines are enforced by the orchestrator; the remaining
/// ceilings are applied inside the child via rlimits before exec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Run-phase deadline.
    pub wall_time: Duration,

    /// Compile-phase deadline (unused for interpreted languages).
    pub compile_time: Duration,

    /// CPU time ceiling (RLIMIT_CPU), whole seconds.
    pub cpu_time: Duration,

    /// Address-space ceiling in bytes (RLIMIT_AS).
    pub memory_bytes: u64,

    /// Per-stream stdout/stderr byte ceiling.
    pub max_output_bytes: usize,

    /// Process/thread count ceiling (RLIMIT_NPROC).
    pub max_processes: u32,

    /// Open file descriptor ceiling (RLIMIT_NOFILE).
    pub max_open_files: u32,

    /// Largest file the sandbox may create (RLIMIT_FSIZE), bytes.
    pub max_file_size_bytes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            wall_time: Duration::from_secs(5),
            compile_time: Duration::from_secs(10),
            cpu_time: Duration::from_secs(5),
            memory_bytes: 256 * 1024 * 1024,
            max_output_bytes: 64 * 1024,
            max_processes: 64,
            max_open_files: 64,
            max_file_size_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ResourceLimits {
    /// Tight limits for lightweight interpreters.
    pub fn interpreted() -> Self {
        Self::default()
    }

    /// Wider memory and compile ceilings for heavyweight toolchains (JVM,
    /// rustc, kotlinc).
    pub fn heavy_compiler() -> Self {
        Self {
            compile_time: Duration::from_secs(20),
            memory_bytes: 1024 * 1024 * 1024,
            max_processes: 128,
            max_open_files: 256,
            ..Self::default()
        }
    }

    pub fn with_wall_time(mut self, wall_time: Duration) -> Self {
        self.wall_time = wall_time;
        self
    }

    pub fn with_memory_bytes(mut self, memory_bytes: u64) -> Self {
        self.memory_bytes = memory_bytes;
        self
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }
}
