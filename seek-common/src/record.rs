//! Execution records handed to the history collaborator.

use crate::outcome::{ExecutionResult, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed execution, in the shape the persistence collaborator
/// expects. The core emits one record per submission that reached a sandbox;
/// it does not persist anything itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    #[serde(rename = "submissionId")]
    pub submission_id: Uuid,
    pub language: String,
    pub outcome: Outcome,
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
    #[serde(rename = "executionTime")]
    pub wall_time_ms: u64,
    #[serde(rename = "memoryUsage")]
    pub peak_memory_bytes: u64,
    #[serde(rename = "stdoutBytes")]
    pub stdout_bytes: usize,
    #[serde(rename = "stderrBytes")]
    pub stderr_bytes: usize,
    #[serde(rename = "requestedAt")]
    pub requested_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn from_result(
        submission_id: Uuid,
        language: impl Into<String>,
        requested_at: DateTime<Utc>,
        result: &ExecutionResult,
    ) -> Self {
        Self {
            submission_id,
            language: language.into(),
            outcome: result.outcome,
            exit_code: result.exit_code,
            wall_time_ms: result.wall_time_ms,
            peak_memory_bytes: result.peak_memory_bytes,
            stdout_bytes: result.stdout.text.len(),
            stderr_bytes: result.stderr.text.len(),
            requested_at,
        }
    }
}

/// Sink for completed execution records.
///
/// The gateway plugs its in-memory history store in here; a deployment with
/// durable persistence swaps in its own implementation.
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    async fn record(&self, record: ExecutionRecord);
}

/// Sink that drops every record. Used when no collaborator is attached.
#[derive(Debug, Default)]
pub struct NullRecordSink;

#[async_trait::async_trait]
impl RecordSink for NullRecordSink {
    async fn record(&self, _record: ExecutionRecord) {}
}
