//! Threat Module
//!
//! Heuristic scoring of running processes: statistical outliers, random
//! looking names, known-bad keywords, shells with network access and
//! system binaries running from the wrong place.
//!
//! ## Structure
//! - `types`: Core types (ProcessSample, ThreatFinding, Severity, etc.)
//! - `rules`: Weights, thresholds and lookup tables
//! - `classifier`: Scoring logic
//!
//! ## Usage
//! ```ignore
//! use crate::logic::threat::{score_processes, Severity};
//!
//! let findings = score_processes(&snapshot.samples, &snapshot.connections);
//! for f in findings.iter().filter(|f| f.severity >= Severity::High) {
//!     println!("{} ({}): {}", f.name, f.pid, f.message);
//! }
//! ```

pub mod types;
pub mod rules;
pub mod classifier;

// Re-export main types for convenience
pub use types::{
    ProcessSample,
    Severity,
    Classification,
    Reason,
    ScoreBreakdown,
    ThreatFinding,
    ThreatReport,
};

pub use rules::{
    ScoringRules,
    REPORT_THRESHOLD,
    Z_SCORE_THRESHOLD,
    ENTROPY_THRESHOLD,
};

pub use classifier::{score_processes, score_processes_with_rules, PopulationBaseline};
