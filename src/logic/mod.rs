//! Logic Module - Business Logic & Engines
//!
//! - `capture/` - Memory acquisition orchestrator
//! - `threat/` - Process anomaly scoring
//! - `collector` - Host and process sampling (sysinfo)
//! - `network` - Socket table and PID -> socket index
//! - `host` - Read-only triage views (processes, sockets, memory, specs)
//! - `stats` - Z-score and entropy helpers
//! - `config` - Capture settings

pub mod stats;
pub mod network;
pub mod collector;
pub mod host;
pub mod config;
pub mod threat;
pub mod capture;
