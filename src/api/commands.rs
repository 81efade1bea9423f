//! Commands - API for the Frontend / CLI
//!
//! Capture control, threat scan, download lookup and host info.
//! Each command has a `*_on` / `*_with` form taking its collaborators
//! explicitly, and a plain form bound to the process-wide instances.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ApiError, ApiResult};
use super::info::{self, CaptureInfo};
use crate::logic::capture::{sidecar, AcquisitionOrchestrator, CaptureFormat, CaptureRequest, CaptureStatus};
use crate::logic::collector::{SysinfoSampler, SystemSampler};
use crate::logic::config::CaptureConfig;
use crate::logic::threat::{self, ThreatReport};

// ============================================================================
// PROCESS-WIDE INSTANCES
// ============================================================================

static ORCHESTRATOR: Lazy<AcquisitionOrchestrator> =
    Lazy::new(|| AcquisitionOrchestrator::with_system(CaptureConfig::from_env()));

/// Kept across scans so CPU deltas start from the previous refresh.
static SCAN_SAMPLER: Lazy<SysinfoSampler> = Lazy::new(SysinfoSampler::new);

pub fn orchestrator() -> &'static AcquisitionOrchestrator {
    &ORCHESTRATOR
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Body of a capture request. Unknown fields are kept and copied into the sidecar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureOptions {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub investigator: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaptureOptions {
    pub fn into_request(self) -> CaptureRequest {
        let case_id = self
            .case_id
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "CASE".to_string());
        let format = self
            .format
            .as_deref()
            .map(CaptureFormat::parse_or_default)
            .unwrap_or_default();

        let mut request = CaptureRequest::new(&case_id, format);
        if let Some(output) = self.output {
            request = request.with_output(output);
        }
        if let Some(investigator) = self.investigator.filter(|i| !i.is_empty()) {
            request = request.with_investigator(&investigator);
        }
        request.extra = self.extra;
        request
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStarted {
    pub status: String,
    pub file: String,
}

// ============================================================================
// CAPTURE COMMANDS
// ============================================================================

/// Start a background capture. 409 while another one is running.
pub async fn start_capture(options: CaptureOptions) -> ApiResult<CaptureStarted> {
    start_capture_on(orchestrator(), options)
}

/// `output`, when given, must be a bare file name: API captures always land
/// in the storage directory.
pub fn start_capture_on(orch: &AcquisitionOrchestrator, options: CaptureOptions) -> ApiResult<CaptureStarted> {
    if let Some(output) = &options.output {
        let name = output.to_str().unwrap_or_default();
        if !is_bare_file_name(name) {
            return Err(ApiError::BadRequest(format!(
                "Invalid output file name: {}",
                output.display()
            )));
        }
    }

    let file = orch.start_capture(options.into_request())?;
    Ok(CaptureStarted {
        status: "started".to_string(),
        file,
    })
}

pub async fn get_capture_status() -> CaptureStatus {
    orchestrator().query_status()
}

pub async fn get_capture_info() -> ApiResult<CaptureInfo> {
    let config = orchestrator().config().clone();
    let info = tokio::task::spawn_blocking(move || info::collect_capture_info(&config)).await?;
    Ok(info)
}

// ============================================================================
// DOWNLOAD
// ============================================================================

/// Path of a finished dump (or sidecar) in the storage directory.
pub async fn resolve_download(file_name: String) -> ApiResult<PathBuf> {
    resolve_download_in(orchestrator().storage_dir(), &file_name)
}

/// Only bare file names of completed captures are served: a dump is finished
/// once its sidecar exists, and a sidecar only alongside its dump.
pub fn resolve_download_in(storage_dir: &Path, file_name: &str) -> ApiResult<PathBuf> {
    if !is_bare_file_name(file_name) {
        return Err(ApiError::BadRequest(format!("Invalid file name: {}", file_name)));
    }

    let path = storage_dir.join(file_name);
    let completed = path.is_file()
        && (sidecar::sidecar_path(&path).is_file()
            || file_name
                .strip_suffix(".json")
                .is_some_and(|dump| storage_dir.join(dump).is_file()));

    if !completed {
        return Err(ApiError::NotFound("File not found".to_string()));
    }
    Ok(path)
}

/// One normal path component, no separators of either platform.
fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    single_normal && !name.contains(['/', '\\', ':'])
}

// ============================================================================
// THREAT SCAN
// ============================================================================

/// Sample every process and score it. Runs off the async runtime.
pub async fn scan_threats() -> ApiResult<ThreatReport> {
    let report = tokio::task::spawn_blocking(|| scan_with(&*SCAN_SAMPLER)).await?;
    Ok(report)
}

pub fn scan_with(sampler: &dyn SystemSampler) -> ThreatReport {
    let snapshot = sampler.snapshot();
    let threats = threat::score_processes(&snapshot.samples, &snapshot.connections);
    log::info!(
        "Threat scan: {} processes, {} findings",
        snapshot.samples.len(),
        threats.len()
    );
    ThreatReport { threats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crate::logic::capture::tool::{OsFamily, ToolCommand, ToolOutput, ToolRunner};
    use crate::logic::capture::CaptureState;
    use crate::logic::collector::ProcessSnapshot;
    use crate::logic::network::ConnectionIndex;
    use crate::logic::threat::{Classification, ProcessSample};

    struct StaticSampler(ProcessSnapshot);

    impl SystemSampler for StaticSampler {
        fn total_memory(&self) -> u64 {
            1024 * 1024
        }

        fn available_space(&self, _path: &Path) -> io::Result<u64> {
            Ok(u64::MAX)
        }

        fn snapshot(&self) -> ProcessSnapshot {
            self.0.clone()
        }
    }

    struct WritingRunner;

    impl ToolRunner for WritingRunner {
        fn run(&self, command: &ToolCommand) -> io::Result<ToolOutput> {
            let output = command.args.last().cloned().unwrap_or_default();
            std::fs::write(output, vec![0u8; 4096])?;
            Ok(ToolOutput::default())
        }
    }

    fn test_orchestrator(dir: &Path) -> AcquisitionOrchestrator {
        std::fs::write(dir.join("winpmem.exe"), b"tool").unwrap();
        AcquisitionOrchestrator::new(
            CaptureConfig::in_dir(dir).with_os(OsFamily::Windows),
            Arc::new(StaticSampler(ProcessSnapshot::default())),
            Arc::new(WritingRunner),
        )
    }

    fn wait_for_terminal(orch: &AcquisitionOrchestrator) -> CaptureStatus {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let status = orch.query_status();
            if status.status.is_terminal() || Instant::now() > deadline {
                return status;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_options_defaults() {
        let options: CaptureOptions = serde_json::from_value(serde_json::json!({
            "format": "VHDX",
            "notes": "seized laptop"
        }))
        .unwrap();
        let request = options.into_request();

        assert_eq!(request.case_id, "CASE");
        assert_eq!(request.format, CaptureFormat::Raw);
        assert_eq!(request.extra.get("notes"), Some(&Value::from("seized laptop")));
        assert!(!request.extra.contains_key("format"));
    }

    #[test]
    fn test_start_capture_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());

        let options = CaptureOptions {
            case_id: Some("IR-12".to_string()),
            format: Some("mem".to_string()),
            ..Default::default()
        };
        let started = start_capture_on(&orch, options).unwrap();
        assert_eq!(started.status, "started");
        assert!(started.file.starts_with("IR-12_") && started.file.ends_with(".mem"));

        let status = wait_for_terminal(&orch);
        assert_eq!(status.status, CaptureState::Completed);

        let path = resolve_download_in(dir.path(), &started.file).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
        assert!(sidecar::sidecar_path(&path).exists());
    }

    #[test]
    fn test_download_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["../etc/passwd", "sub/file.raw", "/etc/passwd", "..", "a\\b.raw", ""] {
            let err = resolve_download_in(dir.path(), name).unwrap_err();
            assert_eq!(err.status(), 400, "{}", name);
        }

        let err = resolve_download_in(dir.path(), "missing.raw").unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_download_only_serves_completed_captures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("avml"), b"tool").unwrap();
        std::fs::write(dir.path().join("partial.raw"), b"half").unwrap();
        std::fs::write(dir.path().join("done.raw"), b"full").unwrap();
        std::fs::write(dir.path().join("done.raw.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("orphan.raw.json"), b"{}").unwrap();

        for name in ["avml", "partial.raw", "orphan.raw.json"] {
            let err = resolve_download_in(dir.path(), name).unwrap_err();
            assert_eq!(err.status(), 404, "{}", name);
        }
        assert_eq!(resolve_download_in(dir.path(), "done.raw").unwrap(), dir.path().join("done.raw"));
        assert_eq!(
            resolve_download_in(dir.path(), "done.raw.json").unwrap(),
            dir.path().join("done.raw.json")
        );
    }

    #[test]
    fn test_start_capture_rejects_output_outside_storage() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());

        let escapes = [
            elsewhere.path().join("evil.raw"),
            PathBuf::from("../evil.raw"),
            PathBuf::from("sub/evil.raw"),
        ];
        for output in escapes {
            let options: CaptureOptions = serde_json::from_value(serde_json::json!({
                "case_id": "X",
                "output": &output,
            }))
            .unwrap();
            let err = start_capture_on(&orch, options).unwrap_err();
            assert_eq!(err.status(), 400, "{}", output.display());
        }

        assert_eq!(orch.query_status().status, CaptureState::Idle);
        assert!(!elsewhere.path().join("evil.raw").exists());
    }

    #[test]
    fn test_start_capture_accepts_bare_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());

        let options = CaptureOptions {
            output: Some(PathBuf::from("named.raw")),
            ..Default::default()
        };
        let started = start_capture_on(&orch, options).unwrap();
        assert_eq!(started.file, "named.raw");
        assert_eq!(wait_for_terminal(&orch).status, CaptureState::Completed);
        assert!(resolve_download_in(dir.path(), "named.raw").is_ok());
    }

    #[test]
    fn test_scan_with_static_snapshot() {
        let snapshot = ProcessSnapshot {
            samples: vec![
                ProcessSample::new(1, "init").with_cpu(0.1),
                ProcessSample::new(2, "backdoor").with_cpu(0.1),
            ],
            connections: ConnectionIndex::new(),
        };
        let report = scan_with(&StaticSampler(snapshot));

        assert_eq!(report.threats.len(), 1);
        assert_eq!(report.threats[0].pid, 2);
        assert_eq!(report.threats[0].classification, Classification::SignatureMatch);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["threats"].is_array());
    }

    #[tokio::test]
    async fn test_scan_threats_live() {
        let report = scan_threats().await.unwrap();
        for pair in report.threats.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_status_starts_idle_or_later() {
        let status = get_capture_status().await;
        assert!(!status.message.is_empty());
    }
}
