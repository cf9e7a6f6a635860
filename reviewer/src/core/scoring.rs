//! Report aggregation.
//!
//! `overall_score` is the rounded mean of the per-file scores of files that
//! were analyzed successfully, minus `critical_penalty` points per critical
//! issue, clamped to `0..=100`. Degraded entries count towards
//! `files_reviewed` but not towards the mean.

use crate::core::types::{FileFindings, FileReport, Report, Severity};

/// Default points subtracted from the overall score per critical issue.
pub const DEFAULT_CRITICAL_PENALTY: u32 = 5;

/// Build the report for `findings`. Pure and order-preserving.
pub fn build_report(findings: &[FileFindings], critical_penalty: u32) -> Report {
    let critical_count = count_severity(findings, Severity::Critical);
    let high_count = count_severity(findings, Severity::High);

    let analyzed: Vec<u32> = findings
        .iter()
        .filter(|entry| !entry.degraded)
        .map(|entry| u32::from(entry.score.min(100)))
        .collect();
    let mean = if analyzed.is_empty() {
        0
    } else {
        let total: u32 = analyzed.iter().sum();
        let count = analyzed.len() as u32;
        (total + count / 2) / count
    };
    let penalty = critical_penalty.saturating_mul(critical_count as u32);
    let overall_score = mean.saturating_sub(penalty).min(100) as u8;

    let files = findings
        .iter()
        .map(|entry| FileReport {
            file: entry.file.clone(),
            score: entry.score.min(100),
            findings: entry.issues.clone(),
        })
        .collect();

    Report {
        overall_score,
        critical_count,
        high_count,
        files_reviewed: findings.len(),
        files,
    }
}

fn count_severity(findings: &[FileFindings], severity: Severity) -> usize {
    findings
        .iter()
        .flat_map(|entry| &entry.issues)
        .filter(|issue| issue.severity == severity)
        .count()
}
