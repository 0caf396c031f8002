//! Seek execution core.
//!
//! Takes a validated submission, runs it inside an isolated, resource-capped
//! process jail, and produces a classified [`seek_common::ExecutionResult`].
//! The pipeline is: validator -> admission queue -> sandbox provisioner ->
//! orchestrator -> result. The HTTP surface lives in `seek-gateway`.

pub mod config;
pub mod limits;
pub mod profile;
pub mod queue;
pub mod runner;
pub mod sandbox;
pub mod service;
pub mod validate;

pub use config::ServiceConfig;
pub use limits::ResourceLimits;
pub use profile::{LanguageProfile, ProfileRegistry};
pub use queue::{ExecutionSlot, QueueController};
pub use sandbox::{SandboxHandle, SandboxProvisioner};
pub use service::{ExecutionReport, ExecutionService, SubmissionPhase, SyntaxReport};
pub use validate::{validate, Submission};
