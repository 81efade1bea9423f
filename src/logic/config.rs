//! Capture Configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::capture::tool::OsFamily;
use super::capture::verdict::EVIDENCE_FLOOR_BYTES;
use crate::constants;

/// Resolved settings for one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Where dumps and sidecars are written
    pub storage_dir: PathBuf,
    /// Where the capture binaries live
    pub tool_dir: PathBuf,
    /// Selects the tool and invocation shape
    pub os: OsFamily,
    pub safety_margin_bytes: u64,
    pub evidence_floor_bytes: u64,
    pub hash_output: bool,
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        let storage_dir = constants::get_storage_dir();
        Self {
            tool_dir: constants::get_tool_dir(&storage_dir),
            storage_dir,
            os: OsFamily::current(),
            safety_margin_bytes: constants::DEFAULT_SAFETY_MARGIN_BYTES,
            evidence_floor_bytes: EVIDENCE_FLOOR_BYTES,
            hash_output: constants::is_dump_hashing_enabled(),
        }
    }

    /// Storage and tools in the same directory, no hashing.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            tool_dir: dir.clone(),
            storage_dir: dir,
            os: OsFamily::current(),
            safety_margin_bytes: constants::DEFAULT_SAFETY_MARGIN_BYTES,
            evidence_floor_bytes: EVIDENCE_FLOOR_BYTES,
            hash_output: false,
        }
    }

    pub fn with_os(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    pub fn with_hashing(mut self, enabled: bool) -> Self {
        self.hash_output = enabled;
        self
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
