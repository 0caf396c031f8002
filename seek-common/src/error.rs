use thiserror::Error;

/// Rejections raised before any sandbox is provisioned.
///
/// These are resolved synchronously and cost zero sandbox resources; the
/// gateway maps them to HTTP 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("code must not be empty")]
    EmptyCode,

    #[error("code exceeds maximum length of {limit} bytes (got {actual})")]
    CodeTooLarge { limit: usize, actual: usize },

    #[error("stdin payload exceeds maximum length of {limit} bytes (got {actual})")]
    StdinTooLarge { limit: usize, actual: usize },

    #[error("code contains disallowed control characters")]
    DisallowedControlCharacters,
}

/// Service-level failures of the execution pipeline.
///
/// User-caused results (compile error, runtime error, limit violations) are
/// not errors; they travel as [`crate::Outcome`] values inside a normal
/// [`crate::ExecutionResult`]. Only `Infra` indicates that the sandbox
/// substrate itself is unhealthy.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("execution capacity exhausted, try again later")]
    Capacity,

    #[error("request canceled before completion")]
    Canceled,

    #[error("sandbox infrastructure failure: {0}")]
    Infra(String),
}

impl ExecError {
    /// Wrap an arbitrary error as an infrastructure failure.
    pub fn infra(err: impl std::fmt::Display) -> Self {
        ExecError::Infra(err.to_string())
    }
}

impl From<std::io::Error> for ExecError {
    fn from(err: std::io::Error) -> Self {
        ExecError::Infra(err.to_string())
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
