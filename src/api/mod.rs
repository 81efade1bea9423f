//! API Module
//!
//! Structure:
//! - commands.rs: capture control, threat scan, download lookup, host info
//! - error.rs: `ApiError`, serialised as `{ error, status }`
//! - info.rs: host facts shown before a capture
//! - triage.rs: read-only host views (stats, processes, sockets, timeline, memory, specs)
//!
//! Usage:
//! - `api::start_capture(options)` then poll `api::get_capture_status()`
//! - `api::scan_threats()`
//! - `api::list_processes()`, `api::get_process_detail(pid)`

pub mod commands;
pub mod error;
pub mod info;
pub mod triage;

pub use commands::*;
pub use error::{ApiError, ApiResult};
pub use info::CaptureInfo;
pub use triage::*;
