//! Threat Types
//!
//! Core types for process threat scoring.
//! No logic here, only data structures.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// PROCESS SAMPLE (input)
// ============================================================================

/// Point-in-time snapshot of one process.
///
/// Resource fields are `None` when the platform refused to report them; that is
/// distinct from a reading of zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
    pub thread_count: Option<u32>,
    pub exe: Option<PathBuf>,
    pub cmdline: Option<Vec<String>>,
    pub has_open_connection: bool,
}

impl ProcessSample {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_cpu(mut self, cpu: f32) -> Self {
        self.cpu_percent = Some(cpu);
        self
    }

    pub fn with_memory(mut self, memory: f32) -> Self {
        self.memory_percent = Some(memory);
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.thread_count = Some(threads);
        self
    }

    pub fn with_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.exe = Some(exe.into());
        self
    }

    pub fn with_connection(mut self, connected: bool) -> Self {
        self.has_open_connection = connected;
        self
    }
}

// ============================================================================
// SEVERITY / CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bucket a score. Total and monotone: > 80 critical, > 50 high, > 20 medium.
    pub fn from_score(score: f64) -> Self {
        if score > 80.0 {
            Severity::Critical
        } else if score > 50.0 {
            Severity::High
        } else if score > 20.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    SignatureMatch,
    Anomaly,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::SignatureMatch => "signature_match",
            Classification::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REASONS
// ============================================================================

/// Why a process earned points. Rendered to text in the finding.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    AbnormalCpu { z: f64 },
    AbnormalMemory { z: f64 },
    HighEntropyName { entropy: f64 },
    SignatureKeyword { keyword: &'static str },
    ReverseShell,
    UntrustedPath,
    Impersonation { expected: &'static str },
}

impl Reason {
    pub fn is_signature(&self) -> bool {
        matches!(self, Reason::SignatureKeyword { .. })
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::AbnormalCpu { z } => write!(f, "Abnormal CPU Usage (Z-Score: {:.1})", z),
            Reason::AbnormalMemory { z } => write!(f, "Abnormal Memory Usage (Z-Score: {:.1})", z),
            Reason::HighEntropyName { entropy } => write!(f, "High Entropy Name ({:.2})", entropy),
            Reason::SignatureKeyword { keyword } => write!(f, "Suspicious Name Match: '{}'", keyword),
            Reason::ReverseShell => f.write_str("Shell with Network Connection (Reverse Shell?)"),
            Reason::UntrustedPath => f.write_str("Running from Temporary/Public Path"),
            Reason::Impersonation { expected } => {
                write!(f, "System Process Impersonation (Expected {})", expected)
            }
        }
    }
}

// ============================================================================
// SCORE BREAKDOWN
// ============================================================================

/// Raw feature values behind a score. `None` when the input was unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub z_cpu: Option<f64>,
    pub z_memory: Option<f64>,
    /// Computed for reference, never weighted into the score.
    pub z_threads: Option<f64>,
    pub name_entropy: f64,
}

// ============================================================================
// THREAT FINDING (output)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatFinding {
    pub pid: u32,
    pub name: String,
    pub score: f64,
    pub severity: Severity,
    pub classification: Classification,
    /// First two reasons in the order they were recorded.
    pub top_reasons: Vec<String>,
    /// `top_reasons` joined with " | ".
    pub message: String,
    pub reasons: Vec<String>,
    pub detail: String,
    pub breakdown: ScoreBreakdown,
}

/// Serialized shape returned to scan callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatReport {
    pub threats: Vec<ThreatFinding>,
}
