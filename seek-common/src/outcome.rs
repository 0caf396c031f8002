//! Outcome taxonomy and the raw result produced by the orchestrator.

use serde::{Deserialize, Serialize};

/// Classification of a finished (or aborted) execution.
///
/// Exactly one value is assigned per submission. Everything except
/// `InfraFailure` is an expected, user-caused outcome and is never logged as
/// a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Exit code 0 and no limit exceeded.
    Success,
    /// Compiler exited non-zero; the run phase was skipped.
    CompileError,
    /// The program exited non-zero (or died to a signal).
    RuntimeError,
    /// A phase deadline expired and the process group was killed.
    Timeout,
    /// The memory ceiling was breached.
    MemoryExceeded,
    /// stdout or stderr hit the byte ceiling and the process was stopped.
    OutputExceeded,
    /// The caller went away before the execution finished.
    Canceled,
    /// The sandbox substrate failed; the only service-level fault.
    InfraFailure,
}

impl Outcome {
    /// Stable identifier used in the wire schema's `error.kind` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::CompileError => "compile_error",
            Outcome::RuntimeError => "runtime_error",
            Outcome::Timeout => "timeout",
            Outcome::MemoryExceeded => "memory_exceeded",
            Outcome::OutputExceeded => "output_exceeded",
            Outcome::Canceled => "canceled",
            Outcome::InfraFailure => "infra_failure",
        }
    }

    /// True for outcomes caused by the submitted code rather than the service.
    pub fn is_user_fault(&self) -> bool {
        !matches!(self, Outcome::InfraFailure | Outcome::Canceled)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured output stream, truncated explicitly and never silently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapturedStream {
    pub text: String,
    pub truncated: bool,
}

impl CapturedStream {
    pub fn new(bytes: Vec<u8>, truncated: bool) -> Self {
        Self {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            truncated,
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            truncated: false,
        }
    }
}

/// Raw output of the execution orchestrator. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    /// Raw exit code, preserved verbatim. Signal deaths are reported as
    /// `128 + signo` (e.g. 139 for SIGSEGV).
    pub exit_code: i32,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    /// Wall time of the run phase (compile phase for compile errors), in
    /// whole milliseconds.
    pub wall_time_ms: u64,
    /// Peak resident memory observed during the run phase, in bytes.
    pub peak_memory_bytes: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Result for a failure that happened before any process ran.
    pub fn infra_failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::InfraFailure,
            exit_code: -1,
            stdout: CapturedStream::default(),
            stderr: CapturedStream::from_text(message),
            wall_time_ms: 0,
            peak_memory_bytes: 0,
        }
    }
}
