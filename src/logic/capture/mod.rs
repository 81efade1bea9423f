//! Capture Module
//!
//! Volatile memory acquisition through an external tool.
//!
//! ## Structure
//! - `types`: Requests, status, sidecar metadata
//! - `error`: Failure taxonomy
//! - `tool`: OS-keyed tool table, command construction, runner seam
//! - `verdict`: Exit code + file evidence decision table
//! - `sidecar`: Metadata JSON next to the dump
//! - `pipeline`: preflight -> invoke -> verdict -> sidecar
//! - `orchestrator`: Single-flight status owner and the two adapters
//!
//! ## Usage
//! ```ignore
//! use crate::logic::capture::{AcquisitionOrchestrator, CaptureFormat, CaptureRequest};
//!
//! let orchestrator = AcquisitionOrchestrator::with_system(CaptureConfig::from_env());
//! let file = orchestrator.start_capture(CaptureRequest::new("CASE-7", CaptureFormat::Raw))?;
//! // poll orchestrator.query_status() until completed / error
//! ```

pub mod types;
pub mod error;
pub mod tool;
pub mod verdict;
pub mod sidecar;
pub mod pipeline;
pub mod orchestrator;

pub use types::{
    CaptureFormat,
    CaptureRequest,
    CaptureState,
    CaptureStatus,
    CaptureMetadata,
    CaptureOutcome,
};

pub use error::CaptureError;

pub use tool::{OsFamily, ProcessRunner, ToolCommand, ToolOutput, ToolRunner};

pub use orchestrator::AcquisitionOrchestrator;
