//! Host Inspector - Read-only Triage Views
//!
//! Live views an investigator looks at before deciding to acquire: headline
//! stats, the process table, one process in detail, sockets, a start-time
//! timeline, memory pressure and the machine's hardware facts.
//!
//! Sampling goes through sysinfo; the shaping (ranking, filtering, limits)
//! is done by plain functions over collected rows.

use std::collections::HashMap;
use std::path::Path;

use chrono::{Local, TimeZone};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Pid, System, Users};

use super::network::{self, ConnectionEntry, ConnectionIndex};

// ============================================================================
// LIMITS
// ============================================================================

pub const PROCESS_LIST_LIMIT: usize = 150;
pub const CONNECTION_LIST_LIMIT: usize = 250;
pub const TIMELINE_LIMIT: usize = 50;
pub const TOP_MEMORY_LIMIT: usize = 20;

/// Processes above this resident size show up in the memory overview.
pub const TOP_MEMORY_MIN_BYTES: u64 = 50 * 1024 * 1024;

/// CPU usage counted as suspicious in the headline stats.
pub const SUSPICIOUS_CPU_PERCENT: f32 = 80.0;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// ============================================================================
// VIEW TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostStats {
    pub cpu: f32,
    pub ram: f32,
    pub process_count: usize,
    pub connection_count: usize,
    pub suspicious_count: usize,
    /// "Nd HH:MM:SS"
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    pub memory_percent: f32,
    pub status: String,
    pub cpu_percent: f32,
    pub num_threads: Option<u32>,
    pub connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub rss: u64,
    pub vms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDetail {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub ppid: Option<u32>,
    /// Local "%Y-%m-%d %H:%M:%S"
    pub create_time: String,
    pub username: Option<String>,
    pub exe: Option<String>,
    /// Arguments joined with single spaces
    pub cmdline: String,
    pub memory_info: MemoryInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub pid: Option<u32>,
    pub local: String,
    /// "N/A" when there is no peer
    pub remote: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// "Unknown" when the owner is not visible
    pub process: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Local "%H:%M:%S"
    pub time: String,
    pub event: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryHog {
    pub pid: u32,
    pub name: String,
    /// Resident size in MB, 2 decimals
    pub memory: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryOverview {
    /// GB, 2 decimals
    pub total: f64,
    pub available: f64,
    pub used: f64,
    pub percent: f64,
    pub top_processes: Vec<MemoryHog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskUsage {
    pub device: String,
    pub mount_point: String,
    /// "N.N GB"
    pub used: String,
    pub total: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub interface: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSpecs {
    pub os: String,
    pub release: String,
    pub version: String,
    pub node: String,
    pub processor: String,
    pub architecture: String,
    pub phys_cores: Option<usize>,
    pub total_cores: usize,
    pub disks: Vec<DiskUsage>,
    pub network: Vec<InterfaceAddress>,
}

// ============================================================================
// SHAPING
// ============================================================================

/// Highest memory first, at most `limit` rows.
pub fn rank_by_memory(mut rows: Vec<ProcessRow>, limit: usize) -> Vec<ProcessRow> {
    rows.sort_by(|a, b| b.memory_percent.total_cmp(&a.memory_percent));
    rows.truncate(limit);
    rows
}

/// Keep entries whose status matches `status` (case-insensitive, empty = all)
/// and attach owner names.
pub fn filter_connections(
    entries: &[ConnectionEntry],
    status: Option<&str>,
    names: &HashMap<u32, String>,
    limit: usize,
) -> Vec<ConnectionRow> {
    let wanted = status
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty());

    entries
        .iter()
        .filter(|e| wanted.as_deref().map_or(true, |w| e.status == w))
        .take(limit)
        .map(|e| ConnectionRow {
            pid: e.pid,
            local: e.local.clone(),
            remote: e.remote.clone().unwrap_or_else(|| "N/A".to_string()),
            status: e.status.clone(),
            kind: e.kind.to_string(),
            process: e
                .pid
                .and_then(|pid| names.get(&pid).cloned())
                .unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect()
}

/// `(pid, name, start time in unix seconds)` -> newest first, at most `limit`.
pub fn build_timeline(mut starts: Vec<(u32, String, u64)>, limit: usize) -> Vec<TimelineEvent> {
    starts.sort_by(|a, b| b.2.cmp(&a.2).then(b.0.cmp(&a.0)));

    starts
        .into_iter()
        .filter_map(|(pid, name, started)| {
            let t = Local.timestamp_opt(started as i64, 0).single()?;
            Some(TimelineEvent {
                time: t.format("%H:%M:%S").to_string(),
                event: format!("Process Started: {}", name),
                details: format!("PID: {} | {}", pid, t.format("%Y-%m-%d")),
            })
        })
        .take(limit)
        .collect()
}

/// `(pid, name, rss bytes)` -> processes above `min_bytes`, largest first.
pub fn top_memory(procs: Vec<(u32, String, u64)>, min_bytes: u64, limit: usize) -> Vec<MemoryHog> {
    let mut hogs: Vec<(u32, String, u64)> = procs.into_iter().filter(|(_, _, rss)| *rss > min_bytes).collect();
    hogs.sort_by(|a, b| b.2.cmp(&a.2));

    hogs.into_iter()
        .take(limit)
        .map(|(pid, name, rss)| MemoryHog {
            pid,
            name,
            memory: round2(rss as f64 / BYTES_PER_MB),
        })
        .collect()
}

pub fn count_suspicious<I>(cpu_usages: I) -> usize
where
    I: IntoIterator<Item = f32>,
{
    cpu_usages.into_iter().filter(|c| *c > SUSPICIOUS_CPU_PERCENT).count()
}

pub fn disk_usage(device: &str, mount_point: &Path, total: u64, available: u64) -> DiskUsage {
    let used = total.saturating_sub(available);
    let percent = if total > 0 {
        round1(used as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    DiskUsage {
        device: device.to_string(),
        mount_point: mount_point.display().to_string(),
        used: format!("{:.1} GB", used as f64 / BYTES_PER_GB),
        total: format!("{:.1} GB", total as f64 / BYTES_PER_GB),
        percent,
    }
}

/// "Nd HH:MM:SS"
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, secs)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn format_local(secs: u64, pattern: &str) -> String {
    Local
        .timestamp_opt(secs as i64, 0)
        .single()
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_default()
}

// ============================================================================
// INSPECTOR
// ============================================================================

/// Holds one `System` so CPU deltas carry over between calls.
pub struct HostInspector {
    system: Mutex<System>,
}

impl HostInspector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Refresh processes twice so per-process CPU usage is a real delta.
    fn refresh_processes(sys: &mut System) {
        sys.refresh_cpu();
        sys.refresh_memory();
        sys.refresh_processes();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();
        sys.refresh_processes();
    }

    pub fn stats(&self) -> HostStats {
        let mut sys = self.system.lock();
        Self::refresh_processes(&mut sys);

        let total = sys.total_memory();
        let ram = if total > 0 {
            (total.saturating_sub(sys.available_memory()) as f64 / total as f64 * 100.0) as f32
        } else {
            0.0
        };

        HostStats {
            cpu: sys.global_cpu_info().cpu_usage(),
            ram: round1(ram as f64) as f32,
            process_count: sys.processes().len(),
            connection_count: network::list_connections().len(),
            suspicious_count: count_suspicious(sys.processes().values().map(|p| p.cpu_usage())),
            uptime: format_uptime(System::uptime()),
        }
    }

    pub fn processes(&self) -> Vec<ProcessRow> {
        let mut sys = self.system.lock();
        Self::refresh_processes(&mut sys);

        let connections = ConnectionIndex::collect();
        let total = sys.total_memory() as f64;

        let rows = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                ProcessRow {
                    pid,
                    name: process.name().to_string(),
                    memory_percent: if total > 0.0 {
                        (process.memory() as f64 / total * 100.0) as f32
                    } else {
                        0.0
                    },
                    status: process.status().to_string(),
                    cpu_percent: process.cpu_usage(),
                    num_threads: process.tasks().map(|t| t.len() as u32),
                    connections: connections.connection_count(pid),
                }
            })
            .collect();

        rank_by_memory(rows, PROCESS_LIST_LIMIT)
    }

    /// `None` when the PID does not exist.
    pub fn process_detail(&self, pid: u32) -> Option<ProcessDetail> {
        let mut sys = self.system.lock();
        let target = Pid::from_u32(pid);
        if !sys.refresh_process(target) {
            return None;
        }
        let process = sys.process(target)?;

        let username = process.user_id().and_then(|uid| {
            let users = Users::new_with_refreshed_list();
            users.get_user_by_id(uid).map(|u| u.name().to_string())
        });

        Some(ProcessDetail {
            pid,
            name: process.name().to_string(),
            status: process.status().to_string(),
            ppid: process.parent().map(|p| p.as_u32()),
            create_time: format_local(process.start_time(), "%Y-%m-%d %H:%M:%S"),
            username,
            exe: process.exe().map(|p| p.display().to_string()),
            cmdline: process.cmd().join(" "),
            memory_info: MemoryInfo {
                rss: process.memory(),
                vms: process.virtual_memory(),
            },
        })
    }

    pub fn connections(&self, status: Option<&str>) -> Vec<ConnectionRow> {
        let entries = network::list_connections();

        let mut sys = self.system.lock();
        sys.refresh_processes();
        let names: HashMap<u32, String> = sys
            .processes()
            .iter()
            .map(|(pid, p)| (pid.as_u32(), p.name().to_string()))
            .collect();

        filter_connections(&entries, status, &names, CONNECTION_LIST_LIMIT)
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        let mut sys = self.system.lock();
        sys.refresh_processes();

        let starts = sys
            .processes()
            .iter()
            .map(|(pid, p)| (pid.as_u32(), p.name().to_string(), p.start_time()))
            .collect();

        build_timeline(starts, TIMELINE_LIMIT)
    }

    pub fn memory(&self) -> MemoryOverview {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        sys.refresh_processes();

        let total = sys.total_memory();
        let available = sys.available_memory();
        let used = sys.used_memory();
        let percent = if total > 0 {
            round1(total.saturating_sub(available) as f64 / total as f64 * 100.0)
        } else {
            0.0
        };

        let procs = sys
            .processes()
            .iter()
            .map(|(pid, p)| (pid.as_u32(), p.name().to_string(), p.memory()))
            .collect();

        MemoryOverview {
            total: round2(total as f64 / BYTES_PER_GB),
            available: round2(available as f64 / BYTES_PER_GB),
            used: round2(used as f64 / BYTES_PER_GB),
            percent,
            top_processes: top_memory(procs, TOP_MEMORY_MIN_BYTES, TOP_MEMORY_LIMIT),
        }
    }

    pub fn specs(&self) -> HostSpecs {
        let mut sys = self.system.lock();
        sys.refresh_cpu();

        let disks = Disks::new_with_refreshed_list()
            .list()
            .iter()
            .map(|d| {
                disk_usage(
                    &d.name().to_string_lossy(),
                    d.mount_point(),
                    d.total_space(),
                    d.available_space(),
                )
            })
            .collect();

        HostSpecs {
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            release: System::kernel_version().unwrap_or_default(),
            version: System::long_os_version().or_else(System::os_version).unwrap_or_default(),
            node: System::host_name().unwrap_or_default(),
            processor: sys.cpus().first().map(|c| c.brand().to_string()).unwrap_or_default(),
            architecture: System::cpu_arch().unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            phys_cores: sys.physical_core_count(),
            total_cores: sys.cpus().len(),
            disks,
            network: ipv4_addresses(),
        }
    }
}

impl Default for HostInspector {
    fn default() -> Self {
        Self::new()
    }
}

/// IPv4 address of every interface.
#[cfg(unix)]
pub fn ipv4_addresses() -> Vec<InterfaceAddress> {
    match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs
            .filter_map(|ifa| {
                let sin = ifa.address.as_ref()?.as_sockaddr_in()?.ip();
                Some(InterfaceAddress {
                    interface: ifa.interface_name,
                    address: sin.to_string(),
                })
            })
            .collect(),
        Err(e) => {
            log::debug!("getifaddrs failed: {}", e);
            Vec::new()
        }
    }
}

#[cfg(not(unix))]
pub fn ipv4_addresses() -> Vec<InterfaceAddress> {
    Vec::new()
}
