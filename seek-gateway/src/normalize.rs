//! Normalization of execution reports into the wire envelope.
//!
//! Total over every outcome the core can produce; an unmapped outcome is a
//! compile error here, not a malformed response in production.

use seek_common::{ApiError, ExecuteData, ExecuteOutput, ExecuteResponse, Outcome};
use seek_sandbox::ExecutionReport;

/// Build the response envelope for a submission that reached a sandbox.
pub fn normalize(report: &ExecutionReport) -> ExecuteResponse {
    let result = &report.result;
    let data = ExecuteData {
        output: ExecuteOutput {
            stdout: result.stdout.text.clone(),
            stderr: result.stderr.text.clone(),
            exit_code: result.exit_code,
            truncated: result.stdout.truncated || result.stderr.truncated,
        },
        execution_time: result.wall_time_ms,
        memory_usage: result.peak_memory_bytes / 1024,
    };

    let error = match result.outcome {
        Outcome::Success => None,
        Outcome::CompileError => Some(error_of(result.outcome, "compilation failed")),
        Outcome::RuntimeError => Some(error_of(
            result.outcome,
            format!("process exited with code {}", result.exit_code),
        )),
        Outcome::Timeout => Some(error_of(result.outcome, "execution exceeded the time limit")),
        Outcome::MemoryExceeded => {
            Some(error_of(result.outcome, "execution exceeded the memory limit"))
        }
        Outcome::OutputExceeded => {
            Some(error_of(result.outcome, "output exceeded the size limit"))
        }
        Outcome::Canceled => Some(error_of(result.outcome, "execution was canceled")),
        Outcome::InfraFailure => {
            let message = if result.stderr.text.trim().is_empty() {
                "internal execution failure".to_string()
            } else {
                result.stderr.text.trim().to_string()
            };
            return ExecuteResponse::failure(Outcome::InfraFailure.as_str(), message);
        }
    };

    ExecuteResponse {
        success: result.outcome == Outcome::Success,
        data: Some(data),
        error,
    }
}

fn error_of(outcome: Outcome, message: impl Into<String>) -> ApiError {
    ApiError {
        kind: outcome.as_str().to_string(),
        message: message.into(),
    }
}
