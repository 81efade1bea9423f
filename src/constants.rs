//! Central Configuration Constants
//!
//! Single source of truth for configuration defaults.
//! Every value can be overridden from the environment.

use std::path::PathBuf;

/// Extra free space required on top of total RAM before a capture starts
pub const DEFAULT_SAFETY_MARGIN_BYTES: u64 = 500 * 1024 * 1024;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Nexus Forensics";

pub const ENV_STORAGE_DIR: &str = "NEXUS_STORAGE_DIR";
pub const ENV_TOOL_DIR: &str = "NEXUS_TOOL_DIR";
pub const ENV_HASH_DUMPS: &str = "NEXUS_HASH_DUMPS";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Directory for dumps and sidecars.
///
/// `NEXUS_STORAGE_DIR`, else the folder holding the running executable,
/// else the local data dir, else the working directory.
pub fn get_storage_dir() -> PathBuf {
    if let Some(dir) = env_path(ENV_STORAGE_DIR) {
        return dir;
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .or_else(|| dirs::data_local_dir().map(|d| d.join("nexus-forensics")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding winpmem.exe / avml. Defaults to the storage directory.
pub fn get_tool_dir(storage_dir: &std::path::Path) -> PathBuf {
    env_path(ENV_TOOL_DIR).unwrap_or_else(|| storage_dir.to_path_buf())
}

/// Whether sidecars carry a SHA-256 of the dump
pub fn is_dump_hashing_enabled() -> bool {
    std::env::var(ENV_HASH_DUMPS)
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
