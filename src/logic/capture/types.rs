//! Capture Types
//!
//! Requests, status and sidecar metadata for memory acquisition.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// REQUEST
// ============================================================================

/// Container format of the dump. Only changes the file extension; the tool
/// decides the actual layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    #[default]
    Raw,
    Lime,
    Mem,
}

impl CaptureFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CaptureFormat::Raw => "raw",
            CaptureFormat::Lime => "lime",
            CaptureFormat::Mem => "mem",
        }
    }

    /// Lenient parse used for untrusted input: unknown formats fall back to raw.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for CaptureFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(CaptureFormat::Raw),
            "lime" => Ok(CaptureFormat::Lime),
            "mem" => Ok(CaptureFormat::Mem),
            other => Err(format!("unknown capture format '{}'", other)),
        }
    }
}

/// One acquisition job as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub case_id: String,
    pub format: CaptureFormat,
    /// Explicit output path. Relative paths are resolved inside the storage directory.
    pub output: Option<PathBuf>,
    pub investigator: String,
    pub created_at: DateTime<Local>,
    /// Caller-supplied fields copied verbatim into the sidecar.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl CaptureRequest {
    pub fn new(case_id: &str, format: CaptureFormat) -> Self {
        Self {
            case_id: case_id.to_string(),
            format,
            output: None,
            investigator: current_investigator(),
            created_at: Local::now(),
            extra: Map::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_investigator(mut self, investigator: &str) -> Self {
        self.investigator = investigator.to_string();
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// `<case>_<YYYYmmdd_HHMMSS>.<ext>` with path-hostile characters removed from the case id.
    pub fn default_file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            sanitize_case_id(&self.case_id),
            self.created_at.format("%Y%m%d_%H%M%S"),
            self.format.extension()
        )
    }
}

/// Keep generated file names inside the storage directory.
pub fn sanitize_case_id(case_id: &str) -> String {
    let cleaned: String = case_id
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");

    if cleaned.is_empty() {
        "CASE".to_string()
    } else {
        cleaned
    }
}

/// Login name of the user running the process.
pub fn current_investigator() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Running => "running",
            CaptureState::Completed => "completed",
            CaptureState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Completed | CaptureState::Error)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of the one tracked capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub status: CaptureState,
    pub progress: u8,
    pub message: String,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self {
            status: CaptureState::Idle,
            progress: 0,
            message: "Ready".to_string(),
            filename: None,
            error: None,
        }
    }
}

// ============================================================================
// METADATA SIDECAR
// ============================================================================

const RESERVED_METADATA_KEYS: &[&str] = &[
    "case_id",
    "investigator",
    "format",
    "timestamp",
    "captured_os",
    "file_size_bytes",
    "sha256",
];

/// Written next to the dump as `<dump file name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub case_id: String,
    pub investigator: String,
    pub format: CaptureFormat,
    pub timestamp: String,
    pub captured_os: String,
    pub file_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaptureMetadata {
    pub fn from_request(request: &CaptureRequest, captured_os: &str, file_size_bytes: u64) -> Self {
        Self {
            case_id: request.case_id.clone(),
            investigator: request.investigator.clone(),
            format: request.format,
            timestamp: request.created_at.to_rfc3339(),
            captured_os: captured_os.to_string(),
            file_size_bytes,
            sha256: None,
            extra: request
                .extra
                .iter()
                .filter(|(key, _)| !RESERVED_METADATA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub output_path: PathBuf,
    pub metadata_path: PathBuf,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub exit_code: i32,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_parse() {
        assert_eq!("LiME".parse::<CaptureFormat>(), Ok(CaptureFormat::Lime));
        assert!("vmem".parse::<CaptureFormat>().is_err());
        assert_eq!(CaptureFormat::parse_or_default("vmem"), CaptureFormat::Raw);
    }

    #[test]
    fn test_default_file_name() {
        let mut req = CaptureRequest::new("CASE042", CaptureFormat::Mem);
        req.created_at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(req.default_file_name(), "CASE042_20240309_140507.mem");
    }

    #[test]
    fn test_case_id_cannot_escape_storage_dir() {
        assert_eq!(sanitize_case_id("../../etc/x"), "____etc_x");
        assert_eq!(sanitize_case_id("a\\b"), "a_b");
        assert_eq!(sanitize_case_id("   "), "CASE");
        assert!(!sanitize_case_id("..").contains(".."));
    }

    #[test]
    fn test_metadata_flattens_extra_fields() {
        let req = CaptureRequest::new("C1", CaptureFormat::Raw)
            .with_investigator("alice")
            .with_extra("note", Value::from("triage"));
        let meta = CaptureMetadata::from_request(&req, "Linux", 1024);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["case_id"], "C1");
        assert_eq!(json["investigator"], "alice");
        assert_eq!(json["format"], "raw");
        assert_eq!(json["captured_os"], "Linux");
        assert_eq!(json["file_size_bytes"], 1024);
        assert_eq!(json["note"], "triage");
        assert!(json.get("sha256").is_none());
    }

    #[test]
    fn test_extra_fields_cannot_override_captured_values() {
        let req = CaptureRequest::new("C1", CaptureFormat::Raw)
            .with_extra("file_size_bytes", Value::from(1))
            .with_extra("captured_os", Value::from("Plan9"));
        let meta = CaptureMetadata::from_request(&req, "Windows", 4096);

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json.matches("file_size_bytes").count(), 1);
        assert!(json.contains("\"captured_os\":\"Windows\""));
        assert!(json.contains("\"file_size_bytes\":4096"));
    }

    #[test]
    fn test_status_default_is_idle() {
        let status = CaptureStatus::default();
        assert_eq!(status.status, CaptureState::Idle);
        assert_eq!(status.message, "Ready");
        assert!(!status.status.is_terminal());
    }
}
