//! Process Threat Scorer
//!
//! Input: a snapshot of processes plus a connection index.
//! Output: findings ranked by score, highest first.

use super::rules::{self, ScoringRules};
use super::types::{
    Classification, ProcessSample, Reason, ScoreBreakdown, Severity, ThreatFinding,
};
use crate::logic::network::ConnectionIndex;
use crate::logic::stats::{self, FeatureStats};

// ============================================================================
// POPULATION BASELINE
// ============================================================================

/// Mean / std-dev of each resource feature across one snapshot.
#[derive(Debug, Clone, Default)]
pub struct PopulationBaseline {
    pub cpu: FeatureStats,
    pub memory: FeatureStats,
    pub threads: FeatureStats,
}

impl PopulationBaseline {
    pub fn from_samples(samples: &[ProcessSample]) -> Self {
        Self {
            cpu: FeatureStats::from_values(samples.iter().filter_map(|s| s.cpu_percent.map(f64::from))),
            memory: FeatureStats::from_values(
                samples.iter().filter_map(|s| s.memory_percent.map(f64::from)),
            ),
            threads: FeatureStats::from_values(
                samples.iter().filter_map(|s| s.thread_count.map(f64::from)),
            ),
        }
    }
}

// ============================================================================
// MAIN SCORING FUNCTION
// ============================================================================

/// Score every sample and return the reportable findings.
pub fn score_processes(samples: &[ProcessSample], connections: &ConnectionIndex) -> Vec<ThreatFinding> {
    score_processes_with_rules(samples, connections, &ScoringRules::default())
}

pub fn score_processes_with_rules(
    samples: &[ProcessSample],
    connections: &ConnectionIndex,
    rules: &ScoringRules,
) -> Vec<ThreatFinding> {
    let baseline = PopulationBaseline::from_samples(samples);

    let mut findings: Vec<ThreatFinding> = samples
        .iter()
        .filter_map(|sample| score_one(sample, &baseline, connections, rules))
        .collect();

    findings.sort_by(|a, b| b.score.total_cmp(&a.score));
    findings.truncate(rules.max_findings);

    log::debug!(
        "Scored {} processes, {} findings above {}",
        samples.len(),
        findings.len(),
        rules.report_threshold
    );
    findings
}

/// Score a single process. `None` when it stays at or below the report threshold.
pub fn score_one(
    sample: &ProcessSample,
    baseline: &PopulationBaseline,
    connections: &ConnectionIndex,
    rules: &ScoringRules,
) -> Option<ThreatFinding> {
    let name_lower = sample.name.to_lowercase();
    let mut score = 0.0f64;
    let mut reasons: Vec<Reason> = Vec::new();

    // --- Statistical anomaly ---
    let z_cpu = sample.cpu_percent.map(|v| baseline.cpu.z_score(f64::from(v)));
    let z_memory = sample.memory_percent.map(|v| baseline.memory.z_score(f64::from(v)));
    let z_threads = sample.thread_count.map(|v| baseline.threads.z_score(f64::from(v)));

    if let Some(z) = z_cpu.filter(|z| *z > rules.z_score_threshold) {
        score += z * rules::CPU_Z_WEIGHT;
        reasons.push(Reason::AbnormalCpu { z });
    }
    if let Some(z) = z_memory.filter(|z| *z > rules.z_score_threshold) {
        score += z * rules::MEMORY_Z_WEIGHT;
        reasons.push(Reason::AbnormalMemory { z });
    }

    // --- Name entropy ---
    let name_core = strip_exe_suffix(&name_lower);
    let entropy = stats::shannon_entropy(name_core);
    if entropy > rules.entropy_threshold && name_core.chars().count() > rules::ENTROPY_MIN_NAME_LEN {
        score += rules::ENTROPY_POINTS;
        reasons.push(Reason::HighEntropyName { entropy });
    }

    // --- Signature keywords ---
    if let Some(keyword) = rules::SUSPICIOUS_KEYWORDS
        .iter()
        .copied()
        .find(|kw| name_lower.contains(kw))
    {
        score += rules::SIGNATURE_POINTS;
        reasons.push(Reason::SignatureKeyword { keyword });
    }

    // --- Network ---
    if sample.has_open_connection || connections.has_connection(sample.pid) {
        if rules::is_shell(&name_lower) {
            score += rules::REVERSE_SHELL_POINTS;
            reasons.push(Reason::ReverseShell);
        } else {
            score += rules::NETWORK_POINTS;
        }
    }

    // --- Path anomalies (only with a known executable path) ---
    if let Some(exe) = &sample.exe {
        let exe_lower = exe.to_string_lossy().to_lowercase();

        if rules::UNTRUSTED_PATH_MARKERS.iter().any(|m| exe_lower.contains(m)) {
            score += rules::UNTRUSTED_PATH_POINTS;
            reasons.push(Reason::UntrustedPath);
        }

        if let Some(expected) = rules::expected_system_dir(&name_lower) {
            if !exe_lower.contains(expected) {
                score += rules::IMPERSONATION_POINTS;
                reasons.push(Reason::Impersonation { expected });
            }
        }
    }

    if score <= rules.report_threshold {
        return None;
    }

    let classification = match reasons.first() {
        Some(r) if r.is_signature() => Classification::SignatureMatch,
        _ => Classification::Anomaly,
    };

    let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
    let top_reasons: Vec<String> = reasons.iter().take(2).cloned().collect();

    Some(ThreatFinding {
        pid: sample.pid,
        name: sample.name.clone(),
        score,
        severity: Severity::from_score(score),
        classification,
        message: top_reasons.join(" | "),
        top_reasons,
        detail: format!("Anomaly Score: {} | Entropy: {:.2}", score.round(), entropy),
        reasons,
        breakdown: ScoreBreakdown {
            z_cpu,
            z_memory,
            z_threads,
            name_entropy: entropy,
        },
    })
}

fn strip_exe_suffix(name_lower: &str) -> &str {
    name_lower.strip_suffix(".exe").unwrap_or(name_lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::threat::{REPORT_THRESHOLD, Z_SCORE_THRESHOLD};

    /// 16 distinct characters: entropy 4.0
    const RANDOM_NAME: &str = "x7f9q2kz4mw8v1rj";

    fn quiet(pid: u32, name: &str) -> ProcessSample {
        ProcessSample::new(pid, name).with_cpu(1.0).with_memory(1.0).with_threads(4)
    }

    fn population(extra: Vec<ProcessSample>) -> Vec<ProcessSample> {
        let mut samples: Vec<ProcessSample> = (0..10).map(|i| quiet(100 + i, &format!("proc{}", i))).collect();
        samples.extend(extra);
        samples
    }

    fn score(samples: &[ProcessSample]) -> Vec<ThreatFinding> {
        score_processes(samples, &ConnectionIndex::new())
    }

    #[test]
    fn test_zero_variance_population() {
        let samples = population(vec![]);
        let baseline = PopulationBaseline::from_samples(&samples);
        let rules = ScoringRules::default();

        for sample in &samples {
            let z = baseline.cpu.z_score(f64::from(sample.cpu_percent.unwrap()));
            assert_eq!(z, 0.0);
            assert!(score_one(sample, &baseline, &ConnectionIndex::new(), &rules).is_none());
        }
        assert!(score(&samples).is_empty());
    }

    #[test]
    fn test_cpu_outlier_is_anomaly() {
        let samples = population(vec![quiet(7, "worker").with_cpu(100.0)]);
        let findings = score(&samples);

        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.pid, 7);
        assert_eq!(f.classification, Classification::Anomaly);
        assert!(f.score > 30.0 && f.score < 33.0);
        assert_eq!(f.severity, Severity::Medium);
        assert!(f.reasons[0].starts_with("Abnormal CPU Usage"));
        assert!(f.breakdown.z_cpu.unwrap() > Z_SCORE_THRESHOLD);
    }

    #[test]
    fn test_high_entropy_name_bonus() {
        // No resource fields at all: the bonus alone decides
        let samples = vec![ProcessSample::new(42, RANDOM_NAME)];
        let findings = score(&samples);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].score >= rules::ENTROPY_POINTS);
        assert!(findings[0].reasons[0].starts_with("High Entropy Name"));
        assert!(findings[0].breakdown.z_cpu.is_none());
    }

    #[test]
    fn test_exe_suffix_ignored_for_entropy() {
        let name = format!("{}.exe", RANDOM_NAME);
        let findings = score(&[ProcessSample::new(42, &name)]);
        assert_eq!(findings.len(), 1);
        assert!((findings[0].breakdown.name_entropy - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_length_gate_counts_characters() {
        // 3 characters but 9 bytes
        let rules = ScoringRules {
            entropy_threshold: 2.0,
            report_threshold: 10.0,
            ..Default::default()
        };
        let connections = ConnectionIndex::new();

        let short = score_processes_with_rules(&[ProcessSample::new(1, "日本語")], &connections, &rules);
        assert!(short.is_empty());

        let long = score_processes_with_rules(&[ProcessSample::new(2, "日本語日本")], &connections, &rules);
        assert_eq!(long.len(), 1);
        assert!(long[0].reasons[0].starts_with("High Entropy Name"));
    }

    #[test]
    fn test_signature_keyword() {
        let samples = population(vec![quiet(66, "Backdoor.exe")]);
        let findings = score(&samples);

        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert!(f.score >= rules::SIGNATURE_POINTS);
        assert_eq!(f.classification, Classification::SignatureMatch);
        assert_eq!(f.top_reasons, vec!["Suspicious Name Match: 'backdoor'".to_string()]);
        assert_eq!(f.detail, "Anomaly Score: 50 | Entropy: 2.75");
    }

    #[test]
    fn test_impersonation_requires_known_path() {
        let fake = quiet(4, "svchost.exe").with_exe("C:\\Users\\bob\\svchost.exe");
        let real = quiet(5, "svchost.exe").with_exe("C:\\Windows\\System32\\svchost.exe");
        let unknown = quiet(6, "svchost.exe");

        let findings = score(&population(vec![fake, real, unknown]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pid, 4);
        assert!(findings[0].score >= rules::IMPERSONATION_POINTS);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].reasons[0].contains("Expected c:\\windows\\system32"));
    }

    #[test]
    fn test_untrusted_path() {
        let sample = quiet(9, "updater.exe").with_exe("C:\\Users\\bob\\AppData\\Local\\Temp\\updater.exe");
        let findings = score(&population(vec![sample]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].score, rules::UNTRUSTED_PATH_POINTS);
        assert_eq!(findings[0].reasons, vec!["Running from Temporary/Public Path".to_string()]);
    }

    #[test]
    fn test_shell_with_connection() {
        let mut connections = ConnectionIndex::new();
        connections.insert(31);

        let samples = population(vec![quiet(31, "cmd.exe"), quiet(32, "bash").with_connection(true), quiet(33, "zsh")]);
        let findings = score_processes(&samples, &connections);

        let pids: Vec<u32> = findings.iter().map(|f| f.pid).collect();
        assert_eq!(findings.len(), 2);
        assert!(pids.contains(&31) && pids.contains(&32));
        for f in &findings {
            assert_eq!(f.score, rules::REVERSE_SHELL_POINTS);
            assert_eq!(f.message, "Shell with Network Connection (Reverse Shell?)");
        }
    }

    #[test]
    fn test_plain_network_process_not_reported() {
        let samples = population(vec![quiet(50, "browser").with_connection(true)]);
        assert!(score(&samples).is_empty());
    }

    #[test]
    fn test_findings_sorted_and_above_threshold() {
        let samples = population(vec![
            ProcessSample::new(1, RANDOM_NAME),
            quiet(2, "miner"),
            quiet(3, "lsass.exe").with_exe("/tmp/lsass.exe"),
            quiet(4, "netcat").with_connection(true),
            quiet(5, "worker").with_cpu(100.0),
        ]);
        let findings = score(&samples);

        assert_eq!(findings.len(), 5);
        assert_eq!(findings[0].pid, 3);
        for pair in findings.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(findings.iter().all(|f| f.score > REPORT_THRESHOLD));
    }

    #[test]
    fn test_two_reasons_joined() {
        let sample = quiet(3, "lsass.exe").with_exe("/tmp/lsass.exe");
        let findings = score(&population(vec![sample]));
        assert_eq!(findings[0].top_reasons.len(), 2);
        assert_eq!(
            findings[0].message,
            "Running from Temporary/Public Path | System Process Impersonation (Expected c:\\windows\\system32)"
        );
    }

    #[test]
    fn test_custom_rules_truncate_and_threshold() {
        let samples = population(vec![quiet(2, "miner"), quiet(3, "keygen"), quiet(4, "payload")]);
        let rules = ScoringRules {
            max_findings: 2,
            ..Default::default()
        };
        assert_eq!(score_processes_with_rules(&samples, &ConnectionIndex::new(), &rules).len(), 2);

        let strict = ScoringRules {
            report_threshold: 50.0,
            ..Default::default()
        };
        assert!(score_processes_with_rules(&samples, &ConnectionIndex::new(), &strict).is_empty());
    }
}
