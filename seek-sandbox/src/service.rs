//! The execution service facade.
//!
//! One entry point per submission: validate, wait for a slot, provision a
//! sandbox, run, always release, then hand the record to the sink. The
//! gateway talks to this type and nothing below it.

use crate::config::ServiceConfig;
use crate::profile::{LanguageProfile, ProfileRegistry, CHECK_TIME_LIMIT};
use crate::queue::QueueController;
use crate::runner;
use crate::sandbox::SandboxProvisioner;
use crate::validate::{validate, Submission};
use chrono::{DateTime, Utc};
use seek_common::{
    ExecError, ExecResult, ExecuteRequest, ExecutionRecord, ExecutionResult, NullRecordSink,
    Outcome, RecordSink, ValidateRequest,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where a submission currently is. Only used for tracing and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Validation,
    Admission,
    Provisioning,
    Execution,
    Recording,
}

impl SubmissionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionPhase::Validation => "validation",
            SubmissionPhase::Admission => "admission",
            SubmissionPhase::Provisioning => "provisioning",
            SubmissionPhase::Execution => "execution",
            SubmissionPhase::Recording => "recording",
        }
    }
}

/// Everything the caller needs to build a response for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub submission_id: Uuid,
    pub language_id: String,
    pub requested_at: DateTime<Utc>,
    pub result: ExecutionResult,
}

/// Result of a syntax-only check.
#[derive(Debug, Clone)]
pub struct SyntaxReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl SyntaxReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Shared, cloneable service handle.
#[derive(Clone)]
pub struct ExecutionService {
    config: ServiceConfig,
    registry: Arc<ProfileRegistry>,
    queue: QueueController,
    provisioner: SandboxProvisioner,
    sink: Arc<dyn RecordSink>,
}

impl ExecutionService {
    pub fn new(config: ServiceConfig, sink: Arc<dyn RecordSink>) -> ExecResult<Self> {
        Self::with_registry(config, Arc::new(ProfileRegistry::builtin()), sink)
    }

    pub fn with_registry(
        config: ServiceConfig,
        registry: Arc<ProfileRegistry>,
        sink: Arc<dyn RecordSink>,
    ) -> ExecResult<Self> {
        let queue = QueueController::new(&config);
        let provisioner = SandboxProvisioner::new(config.scratch_root.clone())?;
        Ok(Self {
            config,
            registry,
            queue,
            provisioner,
            sink,
        })
    }

    /// Service with defaults and no record sink, for tests and the CLI.
    pub fn detached(config: ServiceConfig) -> ExecResult<Self> {
        Self::new(config, Arc::new(NullRecordSink))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &QueueController {
        &self.queue
    }

    /// Live sandboxes right now. Zero when the service is idle.
    pub fn active_sandboxes(&self) -> usize {
        self.provisioner.active_count()
    }

    /// Execute one submission end to end.
    ///
    /// Outcomes caused by the submitted code come back inside the report;
    /// `Err` is reserved for requests that never reached a sandbox
    /// (validation, capacity) and for infrastructure faults.
    pub async fn execute(
        &self,
        raw: &ExecuteRequest,
        cancel: &CancellationToken,
    ) -> ExecResult<ExecutionReport> {
        let (submission, profile) = validate(raw, &self.registry, &self.config)?;
        tracing::debug!(
            submission_id = %submission.id,
            language = %submission.language_id,
            phase = SubmissionPhase::Admission.as_str(),
            "submission accepted"
        );

        let _slot = self.queue.admit().await?;
        if cancel.is_cancelled() {
            return Err(ExecError::Canceled);
        }

        let result = self.run_in_sandbox(&submission, &profile, cancel).await;

        if result.outcome == Outcome::InfraFailure {
            tracing::error!(
                submission_id = %submission.id,
                language = %submission.language_id,
                stderr = %result.stderr.text,
                "sandbox infrastructure failure"
            );
        } else {
            tracing::info!(
                submission_id = %submission.id,
                language = %submission.language_id,
                outcome = result.outcome.as_str(),
                wall_time_ms = result.wall_time_ms,
                "execution finished"
            );
        }
        let record = ExecutionRecord::from_result(
            submission.id,
            &submission.language_id,
            submission.requested_at,
            &result,
        );
        self.sink.record(record).await;

        Ok(ExecutionReport {
            submission_id: submission.id,
            language_id: submission.language_id,
            requested_at: submission.requested_at,
            result,
        })
    }

    async fn run_in_sandbox(
        &self,
        submission: &Submission,
        profile: &LanguageProfile,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let sandbox = match self.provisioner.acquire(submission.id).await {
            Ok(sandbox) => sandbox,
            Err(e) => return ExecutionResult::infra_failure(e.to_string()),
        };
        let result = runner::run(submission, profile, &sandbox, cancel).await;
        // Unconditional; Drop on the handle is only the backstop.
        sandbox.release();
        result
    }

    /// Syntax-check a submission without running it.
    ///
    /// Request-level validation failures are reported as an invalid
    /// submission, not as an error; `Err` keeps the same meaning as in
    /// [`execute`](Self::execute).
    pub async fn check_syntax(
        &self,
        raw: &ValidateRequest,
        cancel: &CancellationToken,
    ) -> ExecResult<SyntaxReport> {
        let request = ExecuteRequest {
            code: raw.code.clone(),
            language: raw.language.clone(),
            input: String::new(),
        };
        let (submission, profile) = match validate(&request, &self.registry, &self.config) {
            Ok(pair) => pair,
            Err(e) => return Ok(SyntaxReport::invalid(vec![e.to_string()])),
        };

        let Some(check_command) = profile.check_command.clone() else {
            // No checker for this toolchain; request-level validation is all
            // we can offer.
            return Ok(SyntaxReport::ok());
        };

        // The check is a plain tool invocation, so it runs through the same
        // jail as an execution, under a profile that only runs the checker.
        let check_profile = LanguageProfile {
            compile_command: None,
            run_command: check_command,
            check_command: None,
            limits: profile.limits.clone().with_wall_time(CHECK_TIME_LIMIT),
            ..(*profile).clone()
        };

        let _slot = self.queue.admit().await?;
        let result = self
            .run_in_sandbox(&submission, &check_profile, cancel)
            .await;

        match result.outcome {
            Outcome::Success => Ok(SyntaxReport::ok()),
            Outcome::InfraFailure => Err(ExecError::Infra(result.stderr.text)),
            _ => Ok(SyntaxReport::invalid(diagnostic_lines(&result))),
        }
    }
}

/// Checker diagnostics, whichever stream the tool wrote them to.
fn diagnostic_lines(result: &ExecutionResult) -> Vec<String> {
    let source = if result.stderr.text.trim().is_empty() {
        &result.stdout.text
    } else {
        &result.stderr.text
    };
    let lines: Vec<String> = source
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect();
    if lines.is_empty() {
        vec!["syntax check failed".into()]
    } else {
        lines
    }
}
