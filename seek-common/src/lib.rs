//! Shared types for the Seek code execution service.
//!
//! Everything here is plain data: the wire schema spoken by the playground
//! frontend, the outcome taxonomy produced by the execution core, and the
//! records handed to the history collaborator. No I/O lives in this crate.

pub mod error;
pub mod outcome;
pub mod record;
pub mod wire;

pub use error::{ExecError, ExecResult, ValidationError};
pub use outcome::{CapturedStream, ExecutionResult, Outcome};
pub use record::{ExecutionRecord, NullRecordSink, RecordSink};
pub use wire::{
    ApiError, ExecuteData, ExecuteOutput, ExecuteRequest, ExecuteResponse, ValidateData,
    ValidateRequest, ValidateResponse,
};
