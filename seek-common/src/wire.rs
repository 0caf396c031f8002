//! JSON shapes spoken by the playground frontend.
//!
//! Field names follow the existing HTTP contract (camelCase), so every struct
//! carries explicit serde renames rather than relying on Rust naming.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/code/execute` and `POST /api/v1/code/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: String,
    /// Payload piped to the program's stdin.
    #[serde(default)]
    pub input: String,
}

/// Body of `POST /api/code/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub language: String,
}

/// Captured stdout/stderr with explicit truncation flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteOutput {
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
    pub truncated: bool,
}

/// Execution payload returned for every submission that reached a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteData {
    pub output: ExecuteOutput,
    /// Wall time in milliseconds.
    #[serde(rename = "executionTime")]
    pub execution_time: u64,
    /// Peak memory in kilobytes.
    #[serde(rename = "memoryUsage")]
    pub memory_usage: u64,
}

/// Structured error object attached to non-success responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

/// Top-level envelope for execute responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExecuteData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ExecuteResponse {
    pub fn failure(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }
}

/// Payload of `POST /api/code/validate` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateData {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub data: ValidateData,
}
