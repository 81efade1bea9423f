//! Host Capture Info
//!
//! What an investigator checks before acquiring: which host, which OS, how
//! much RAM will be dumped, and whether this session can actually capture.

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::logic::capture::error::human_gb;
use crate::logic::capture::tool::{self, OsFamily};
use crate::logic::config::CaptureConfig;
use crate::logic::host::format_uptime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureInfo {
    pub hostname: String,
    pub os: String,
    /// "N.NN GB"
    pub ram_total: String,
    pub ram_total_bytes: u64,
    /// "Nd HH:MM:SS"
    pub uptime: String,
    pub is_admin: bool,
    /// Capture binary present in the tool directory
    pub tool_available: bool,
    pub tool_name: Option<String>,
    pub storage_dir: String,
}

pub fn collect_capture_info(config: &CaptureConfig) -> CaptureInfo {
    let mut sys = System::new();
    sys.refresh_memory();
    let ram_total_bytes = sys.total_memory();

    let hostname = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .or_else(System::host_name)
        .unwrap_or_else(|| "unknown".to_string());

    let os = match (System::name(), System::os_version()) {
        (Some(name), Some(version)) => format!("{} {}", name, version),
        (Some(name), None) => name,
        _ => System::long_os_version().unwrap_or_else(|| config.os.to_string()),
    };

    let spec = tool::tool_spec(config.os);

    CaptureInfo {
        hostname,
        os,
        ram_total: human_gb(ram_total_bytes),
        ram_total_bytes,
        uptime: format_uptime(System::uptime()),
        is_admin: is_admin(),
        tool_available: tool::resolve_tool(config.os, &config.tool_dir).is_ok(),
        tool_name: spec.map(|s| s.display_name.to_string()),
        storage_dir: config.storage_dir.display().to_string(),
    }
}

/// Whether the current session has the privileges a capture needs.
#[cfg(unix)]
pub fn is_admin() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(windows)]
pub fn is_admin() -> bool {
    // `net session` only succeeds from an elevated shell
    std::process::Command::new("net")
        .arg("session")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
pub fn is_admin() -> bool {
    false
}

/// Friendly name for logs.
pub fn platform_label(os: OsFamily) -> &'static str {
    match os {
        OsFamily::Windows => "Windows (WinPMEM)",
        OsFamily::Linux => "Linux (AVML)",
        OsFamily::MacOs | OsFamily::Other => "unsupported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_reports_tool_presence() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig::in_dir(dir.path()).with_os(OsFamily::Linux);

        let info = collect_capture_info(&config);
        assert!(!info.tool_available);
        assert_eq!(info.tool_name.as_deref(), Some("AVML"));
        assert!(info.ram_total.ends_with(" GB"));
        assert!(!info.hostname.is_empty());

        std::fs::write(dir.path().join("avml"), b"tool").unwrap();
        assert!(collect_capture_info(&config).tool_available);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_is_admin_follows_effective_uid() {
        // Uid line: real, effective, saved, fs
        let status = std::fs::read_to_string("/proc/self/status").unwrap();
        let euid: u32 = status
            .lines()
            .find_map(|l| l.strip_prefix("Uid:"))
            .and_then(|ids| ids.split_whitespace().nth(1))
            .and_then(|id| id.parse().ok())
            .unwrap();
        assert_eq!(is_admin(), euid == 0);
    }

    #[test]
    fn test_unsupported_platform_has_no_tool() {
        let dir = tempfile::tempdir().unwrap();
        let info = collect_capture_info(&CaptureConfig::in_dir(dir.path()).with_os(OsFamily::MacOs));
        assert!(!info.tool_available);
        assert!(info.tool_name.is_none());
        assert_eq!(platform_label(OsFamily::MacOs), "unsupported");
    }
}
