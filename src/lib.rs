//! Nexus Forensics Core
//!
//! Memory acquisition orchestration and process anomaly scoring for a
//! host-forensics workstation.

pub mod api;
pub mod constants;
pub mod logic;
