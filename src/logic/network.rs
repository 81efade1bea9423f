//! Connection Index
//!
//! Which PIDs currently own an inet socket, and the socket table itself.
//!
//! # Data Sources
//! - Linux: `/proc/net/{tcp,tcp6,udp,udp6}` socket tables joined with `/proc/[pid]/fd`
//! - Windows: `netstat -ano`
//! - elsewhere: empty
//!
//! Listening sockets count as connections.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

// ============================================================================
// SOCKET TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SocketKind {
    Tcp,
    Udp,
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SocketKind::Tcp => "TCP",
            SocketKind::Udp => "UDP",
        })
    }
}

/// One inet socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    /// `None` when the owner is not visible to this user
    pub pid: Option<u32>,
    pub kind: SocketKind,
    /// `ip:port`
    pub local: String,
    /// `None` for listening / unconnected sockets
    pub remote: Option<String>,
    /// `ESTABLISHED`, `LISTEN`, ... and `NONE` for UDP
    pub status: String,
}

/// Every inet socket on the host. Never fails; unreadable sources are skipped.
pub fn list_connections() -> Vec<ConnectionEntry> {
    list_platform()
}

// ============================================================================
// PER-PID INDEX
// ============================================================================

/// PID -> number of open inet sockets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionIndex {
    counts: HashMap<u32, usize>,
}

impl ConnectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: u32) {
        *self.counts.entry(pid).or_insert(0) += 1;
    }

    pub fn has_connection(&self, pid: u32) -> bool {
        self.counts.get(&pid).is_some_and(|c| *c > 0)
    }

    pub fn connection_count(&self, pid: u32) -> usize {
        self.counts.get(&pid).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Snapshot the host's connections. Never fails; unreadable sources are skipped.
    pub fn collect() -> Self {
        let index = Self::from_entries(&list_connections());
        log::debug!("Connection index: {} processes with sockets", index.len());
        index
    }

    pub fn from_entries(entries: &[ConnectionEntry]) -> Self {
        entries.iter().filter_map(|e| e.pid).collect()
    }
}

impl FromIterator<u32> for ConnectionIndex {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        let mut index = Self::new();
        for pid in iter {
            index.insert(pid);
        }
        index
    }
}

// ============================================================================
// LINUX
// ============================================================================

#[cfg(target_os = "linux")]
fn list_platform() -> Vec<ConnectionEntry> {
    use std::fs;

    let mut rows: Vec<(ConnectionEntry, u64)> = Vec::new();
    for (table, kind) in [
        ("/proc/net/tcp", SocketKind::Tcp),
        ("/proc/net/tcp6", SocketKind::Tcp),
        ("/proc/net/udp", SocketKind::Udp),
        ("/proc/net/udp6", SocketKind::Udp),
    ] {
        match fs::read_to_string(table) {
            Ok(content) => rows.extend(parse_proc_net(&content, kind)),
            Err(e) => log::debug!("Skipping {}: {}", table, e),
        }
    }

    if rows.is_empty() {
        return Vec::new();
    }

    let owners = socket_owners();
    rows.into_iter()
        .map(|(mut entry, inode)| {
            entry.pid = owners.get(&inode).copied();
            entry
        })
        .collect()
}

/// Socket inode -> owning PID, from `/proc/[pid]/fd` links.
#[cfg(target_os = "linux")]
fn socket_owners() -> HashMap<u64, u32> {
    use std::fs;

    let mut owners = HashMap::new();
    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return owners;
    };

    for entry in proc_dir.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };

        // Processes owned by other users deny fd access; skip them.
        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };

        for fd in fds.flatten() {
            if let Ok(target) = fs::read_link(fd.path()) {
                if let Some(inode) = parse_socket_link(&target.to_string_lossy()) {
                    owners.entry(inode).or_insert(pid);
                }
            }
        }
    }

    owners
}

/// Rows of a `/proc/net/{tcp,udp}[6]` table with their socket inode.
/// The pid is filled in later.
pub fn parse_proc_net(content: &str, kind: SocketKind) -> Vec<(ConnectionEntry, u64)> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                return None;
            }
            let inode = fields[9].parse::<u64>().ok().filter(|inode| *inode != 0)?;
            let (local_ip, local_port) = parse_hex_endpoint(fields[1])?;
            let (remote_ip, remote_port) = parse_hex_endpoint(fields[2])?;

            let remote = if remote_ip.is_unspecified() && remote_port == 0 {
                None
            } else {
                Some(format!("{}:{}", remote_ip, remote_port))
            };
            let status = match kind {
                SocketKind::Tcp => tcp_state_name(fields[3]).to_string(),
                SocketKind::Udp => "NONE".to_string(),
            };

            let entry = ConnectionEntry {
                pid: None,
                kind,
                local: format!("{}:{}", local_ip, local_port),
                remote,
                status,
            };
            Some((entry, inode))
        })
        .collect()
}

/// `0100007F:1F90` -> 127.0.0.1, 8080. Address words are in host (little-endian) order.
pub fn parse_hex_endpoint(field: &str) -> Option<(IpAddr, u16)> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;

    let ip = match addr.len() {
        8 => {
            let word = u32::from_str_radix(addr, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_le_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(addr.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };

    Some((ip, port))
}

fn tcp_state_name(code: &str) -> &'static str {
    match code {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        _ => "NONE",
    }
}

/// `socket:[12345]` -> 12345
pub fn parse_socket_link(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

// ============================================================================
// WINDOWS
// ============================================================================

#[cfg(windows)]
fn list_platform() -> Vec<ConnectionEntry> {
    use std::process::Command;

    match Command::new("netstat").args(["-ano"]).output() {
        Ok(output) if output.status.success() => {
            parse_netstat(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            log::debug!("netstat exited with {:?}", output.status.code());
            Vec::new()
        }
        Err(e) => {
            log::debug!("netstat unavailable: {}", e);
            Vec::new()
        }
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
fn list_platform() -> Vec<ConnectionEntry> {
    Vec::new()
}

/// Parse `netstat -ano` output. UDP rows have no state column; the owning
/// PID is always the last column.
pub fn parse_netstat(output: &str) -> Vec<ConnectionEntry> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let kind = match fields.first()?.to_ascii_uppercase().as_str() {
                "TCP" => SocketKind::Tcp,
                "UDP" => SocketKind::Udp,
                _ => return None,
            };
            let local = fields.get(1)?.to_string();
            let remote = fields
                .get(2)
                .filter(|r| !matches!(**r, "*:*" | "0.0.0.0:0" | "[::]:0"))
                .map(|r| r.to_string());
            let status = match kind {
                SocketKind::Tcp if fields.len() >= 5 => fields[3].to_string(),
                _ => "NONE".to_string(),
            };
            let pid = fields.last()?.parse::<u32>().ok().filter(|pid| *pid != 0);

            Some(ConnectionEntry {
                pid,
                kind,
                local,
                remote,
                status: normalize_netstat_state(&status),
            })
        })
        .collect()
}

/// netstat spells a few states differently from the Linux tables.
fn normalize_netstat_state(state: &str) -> String {
    match state {
        "LISTENING" => "LISTEN".to_string(),
        "SYN_RECEIVED" => "SYN_RECV".to_string(),
        "FIN_WAIT_1" => "FIN_WAIT1".to_string(),
        "FIN_WAIT_2" => "FIN_WAIT2".to_string(),
        other => other.to_string(),
    }
}
