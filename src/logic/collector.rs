//! Collector - System Sampling
//!
//! Point-in-time process and host metrics read through the sysinfo crate.
//! Every per-process field is best effort: a value the OS refuses to report
//! becomes `None` and the process is still sampled.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use super::network::ConnectionIndex;
use super::threat::ProcessSample;

// ============================================================================
// SAMPLER SEAM
// ============================================================================

/// One consistent view of the running processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub samples: Vec<ProcessSample>,
    pub connections: ConnectionIndex,
}

/// Read-only source of host metrics.
pub trait SystemSampler: Send + Sync {
    /// Total physical memory in bytes.
    fn total_memory(&self) -> u64;

    /// Free bytes on the volume holding `path`.
    fn available_space(&self, path: &Path) -> io::Result<u64>;

    fn snapshot(&self) -> ProcessSnapshot;
}

// ============================================================================
// SYSINFO IMPLEMENTATION
// ============================================================================

pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for SysinfoSampler {
    fn total_memory(&self) -> u64 {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        sys.total_memory()
    }

    fn available_space(&self, path: &Path) -> io::Result<u64> {
        let path = path.canonicalize()?;
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mounted volume found for {}", path.display()),
                )
            })
    }

    fn snapshot(&self) -> ProcessSnapshot {
        let mut sys = self.system.lock();

        // CPU usage is a delta between two refreshes
        sys.refresh_all();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_processes();

        let connections = ConnectionIndex::collect();
        let total_memory = sys.total_memory() as f64;

        let samples: Vec<ProcessSample> = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                let memory_percent = if total_memory > 0.0 {
                    Some((process.memory() as f64 / total_memory * 100.0) as f32)
                } else {
                    None
                };
                let cmd = process.cmd();

                ProcessSample {
                    pid,
                    name: process.name().to_string(),
                    cpu_percent: Some(process.cpu_usage()).filter(|c| c.is_finite()),
                    memory_percent,
                    thread_count: process.tasks().map(|t| t.len() as u32),
                    exe: process.exe().map(Path::to_path_buf),
                    cmdline: if cmd.is_empty() { None } else { Some(cmd.to_vec()) },
                    has_open_connection: connections.has_connection(pid),
                }
            })
            .collect();

        log::debug!(
            "Sampled {} processes ({} with sockets)",
            samples.len(),
            connections.len()
        );

        ProcessSnapshot { samples, connections }
    }
}

/// Directory a capture output will be written to, for free-space lookups.
pub fn volume_lookup_path(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_lookup_path() {
        assert_eq!(volume_lookup_path(Path::new("/data/case.raw")), PathBuf::from("/data"));
        assert_eq!(volume_lookup_path(Path::new("case.raw")), PathBuf::from("."));
    }

    #[test]
    fn test_live_sampler_reports_memory_and_self() {
        let sampler = SysinfoSampler::new();
        assert!(sampler.total_memory() > 0);

        let snapshot = sampler.snapshot();
        let me = std::process::id();
        assert!(snapshot.samples.iter().any(|s| s.pid == me));
    }

    #[test]
    fn test_live_free_space_of_temp_dir() {
        let sampler = SysinfoSampler::new();
        let dir = tempfile::tempdir().unwrap();
        // Some sandboxes expose no disks; only check the happy path when one is visible.
        if let Ok(free) = sampler.available_space(dir.path()) {
            assert!(free > 0);
        }
    }
}
