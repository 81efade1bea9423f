//! Triage Commands
//!
//! Read-only host views for the dashboard. Nothing here changes the host.

use once_cell::sync::Lazy;

use super::error::{ApiError, ApiResult};
use crate::logic::host::{
    ConnectionRow, HostInspector, HostSpecs, HostStats, MemoryOverview, ProcessDetail, ProcessRow,
    TimelineEvent,
};

/// Shared so CPU usage is measured against the previous refresh.
static INSPECTOR: Lazy<HostInspector> = Lazy::new(HostInspector::new);

pub fn inspector() -> &'static HostInspector {
    &INSPECTOR
}

pub async fn get_system_stats() -> ApiResult<HostStats> {
    Ok(tokio::task::spawn_blocking(|| INSPECTOR.stats()).await?)
}

/// Top processes by memory share.
pub async fn list_processes() -> ApiResult<Vec<ProcessRow>> {
    Ok(tokio::task::spawn_blocking(|| INSPECTOR.processes()).await?)
}

pub async fn get_process_detail(pid: u32) -> ApiResult<ProcessDetail> {
    let detail = tokio::task::spawn_blocking(move || INSPECTOR.process_detail(pid)).await?;
    detail.ok_or_else(|| ApiError::NotFound(format!("Process not found: {}", pid)))
}

/// Inet sockets, optionally only those in `status` (e.g. `ESTABLISHED`).
pub async fn list_connections(status: Option<String>) -> ApiResult<Vec<ConnectionRow>> {
    Ok(tokio::task::spawn_blocking(move || INSPECTOR.connections(status.as_deref())).await?)
}

pub async fn get_timeline() -> ApiResult<Vec<TimelineEvent>> {
    Ok(tokio::task::spawn_blocking(|| INSPECTOR.timeline()).await?)
}

pub async fn get_memory_overview() -> ApiResult<MemoryOverview> {
    Ok(tokio::task::spawn_blocking(|| INSPECTOR.memory()).await?)
}

pub async fn get_host_specs() -> ApiResult<HostSpecs> {
    Ok(tokio::task::spawn_blocking(|| INSPECTOR.specs()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::host::{CONNECTION_LIST_LIMIT, PROCESS_LIST_LIMIT, TIMELINE_LIMIT};

    #[tokio::test]
    async fn test_process_detail_for_self() {
        let pid = std::process::id();
        let detail = get_process_detail(pid).await.unwrap();
        assert_eq!(detail.pid, pid);
        assert!(!detail.cmdline.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_process_is_not_found() {
        let err = get_process_detail(u32::MAX - 1).await.unwrap_err();
        assert_eq!(err.status(), 404);
        assert_eq!(err.to_string(), format!("Process not found: {}", u32::MAX - 1));
    }

    #[tokio::test]
    async fn test_process_list_contains_self() {
        let rows = list_processes().await.unwrap();
        assert!(!rows.is_empty());
        assert!(rows.len() <= PROCESS_LIST_LIMIT);
        assert!(rows.windows(2).all(|w| w[0].memory_percent >= w[1].memory_percent));
    }

    #[tokio::test]
    async fn test_stats_and_timeline() {
        let stats = get_system_stats().await.unwrap();
        assert!(stats.process_count > 0);
        assert!(stats.ram > 0.0 && stats.ram <= 100.0);
        assert!(stats.uptime.contains('d'));

        let timeline = get_timeline().await.unwrap();
        assert!(!timeline.is_empty());
        assert!(timeline.len() <= TIMELINE_LIMIT);
        assert!(timeline.iter().all(|e| e.event.starts_with("Process Started: ")));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_connections_filter_by_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let local = listener.local_addr().unwrap().to_string();

        let listening = list_connections(Some("listen".to_string())).await.unwrap();
        assert!(listening.len() <= CONNECTION_LIST_LIMIT);
        assert!(listening.iter().all(|c| c.status == "LISTEN"));
        let own = listening.iter().find(|c| c.local == local).unwrap();
        assert_eq!(own.remote, "N/A");
        assert_eq!(own.kind, "TCP");

        let established = list_connections(Some("ESTABLISHED".to_string())).await.unwrap();
        assert!(established.iter().all(|c| c.local != local));
    }
}
