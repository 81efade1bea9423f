//! Threat Scoring Rules & Thresholds
//!
//! Constants and lookup tables for process scoring.
//! No scoring logic here.

use serde::{Deserialize, Serialize};

// ============================================================================
// STATISTICAL THRESHOLDS
// ============================================================================

/// z-score above which CPU / memory usage counts as abnormal
pub const Z_SCORE_THRESHOLD: f64 = 3.0;

/// Points per standard deviation of CPU usage
pub const CPU_Z_WEIGHT: f64 = 10.0;

/// Points per standard deviation of memory usage
pub const MEMORY_Z_WEIGHT: f64 = 5.0;

// ============================================================================
// NAME ENTROPY
// ============================================================================

pub const ENTROPY_THRESHOLD: f64 = 3.8;

/// Names this short are ignored by the entropy check
pub const ENTROPY_MIN_NAME_LEN: usize = 4;

pub const ENTROPY_POINTS: f64 = 30.0;

// ============================================================================
// HEURISTIC POINTS
// ============================================================================

pub const SIGNATURE_POINTS: f64 = 50.0;
pub const REVERSE_SHELL_POINTS: f64 = 100.0;
pub const NETWORK_POINTS: f64 = 5.0;
pub const UNTRUSTED_PATH_POINTS: f64 = 40.0;
pub const IMPERSONATION_POINTS: f64 = 100.0;

// ============================================================================
// REPORTING
// ============================================================================

/// Findings at or below this score are dropped
pub const REPORT_THRESHOLD: f64 = 20.0;

/// Maximum findings returned by one scan
pub const MAX_FINDINGS: usize = 50;

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Matched as case-insensitive substrings, first hit wins.
pub const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "nc", "ncat", "netcat", "reverse", "shell", "backdoor", "miner", "keygen", "mimikatz",
    "hack", "crack", "payload",
];

/// Interactive shells (exact, lower-cased process names).
pub const SHELL_NAMES: &[&str] = &[
    "cmd.exe",
    "powershell.exe",
    "bash.exe",
    "wscript.exe",
    "bash",
    "sh",
    "zsh",
    "dash",
];

/// Substrings of executable paths that nothing trusted should run from.
pub const UNTRUSTED_PATH_MARKERS: &[&str] = &["temp", "tmp", "appdata", "downloads", "users\\public"];

/// Well-known system processes and the directory their binary must live in.
pub const SYSTEM_PROCESS_PATHS: &[(&str, &str)] = &[
    ("svchost.exe", "c:\\windows\\system32"),
    ("csrss.exe", "c:\\windows\\system32"),
    ("lsass.exe", "c:\\windows\\system32"),
    ("services.exe", "c:\\windows\\system32"),
    ("winlogon.exe", "c:\\windows\\system32"),
    ("explorer.exe", "c:\\windows"),
];

pub fn expected_system_dir(name_lower: &str) -> Option<&'static str> {
    SYSTEM_PROCESS_PATHS
        .iter()
        .find(|(name, _)| *name == name_lower)
        .map(|(_, dir)| *dir)
}

pub fn is_shell(name_lower: &str) -> bool {
    SHELL_NAMES.contains(&name_lower)
}

// ============================================================================
// CONFIGURABLE RULES
// ============================================================================

/// Tunable knobs for a scan. Defaults are the constants above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRules {
    pub z_score_threshold: f64,
    pub entropy_threshold: f64,
    pub report_threshold: f64,
    pub max_findings: usize,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            z_score_threshold: Z_SCORE_THRESHOLD,
            entropy_threshold: ENTROPY_THRESHOLD,
            report_threshold: REPORT_THRESHOLD,
            max_findings: MAX_FINDINGS,
        }
    }
}
