//! Ticket comments and chat messages rendered from minijinja templates.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};
use serde::Serialize;

use crate::core::types::{FileFindings, Report, Severity};

/// Highlights shown per severity in chat.
pub const CHAT_ISSUE_LIMIT: usize = 5;
/// Strengths and improvements shown in chat.
pub const CHAT_HIGHLIGHT_LIMIT: usize = 3;
/// Files named in the clone summary.
pub const CLONE_SUMMARY_FILES: usize = 5;

const TEMPLATES: &[(&str, &str)] = &[
    ("ticket_description", include_str!("templates/ticket_description.md")),
    ("ticket_initiated", include_str!("templates/ticket_initiated.md")),
    ("chat_start", include_str!("templates/chat_start.md")),
    ("clone_summary", include_str!("templates/clone_summary.md")),
    ("ticket_summary", include_str!("templates/ticket_summary.md")),
    ("issue_list", include_str!("templates/issue_list.md")),
    ("line_findings", include_str!("templates/line_findings.md")),
    ("strengths", include_str!("templates/strengths.md")),
    ("report_download", include_str!("templates/report_download.md")),
    ("chat_summary", include_str!("templates/chat_summary.md")),
    ("ask_for_input", include_str!("templates/ask_for_input.md")),
];

static ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    for &(name, source) in TEMPLATES {
        env.add_template(name, source)
            .expect("message template should be valid");
    }
    env
});

pub const CHAT_PROGRESS: &str = "Running code analysis...";

fn render(name: &str, ctx: Value) -> Result<String> {
    let template = ENV.get_template(name)?;
    template
        .render(ctx)
        .with_context(|| format!("render {name} message"))
}

#[derive(Debug, Serialize)]
struct IssueLine<'a> {
    file: &'a str,
    line: u32,
    category: &'a str,
    description: &'a str,
    fix: &'a str,
}

pub fn ticket_title(repo_name: &str) -> String {
    format!("AI Code Review: {repo_name}")
}

pub fn ticket_description(repo_url: &str, intent: &str) -> Result<String> {
    render("ticket_description", context! { repo_url, intent })
}

pub fn ticket_initiated(repo_url: &str, intent: &str) -> Result<String> {
    render("ticket_initiated", context! { repo_url, intent })
}

pub fn chat_start(repo_url: &str, ticket: &str, intent: &str) -> Result<String> {
    render("chat_start", context! { repo_url, ticket, intent })
}

pub fn clone_summary(files: &[String]) -> Result<String> {
    let shown = &files[..files.len().min(CLONE_SUMMARY_FILES)];
    render(
        "clone_summary",
        context! { file_count => files.len(), files => shown },
    )
}

pub fn ticket_summary(report: &Report, repo_url: &str, intent: &str) -> Result<String> {
    render(
        "ticket_summary",
        context! { report => Value::from_serialize(report), repo_url, intent },
    )
}

/// Listing of every issue of `severity`, or `None` when there are none.
///
/// `limit` caps how many are listed; the rest are summarized as a count.
pub fn issue_list(report: &Report, severity: Severity, limit: Option<usize>) -> Result<Option<String>> {
    let all: Vec<IssueLine<'_>> = report
        .issues_with_severity(severity)
        .map(|(file, finding)| IssueLine {
            file,
            line: finding.line,
            category: finding.category.as_str(),
            description: &finding.description,
            fix: finding.suggested_fix.as_deref().unwrap_or("n/a"),
        })
        .collect();
    if all.is_empty() {
        return Ok(None);
    }
    let shown = limit.unwrap_or(all.len()).min(all.len());
    let heading = match severity {
        Severity::Critical => "Critical issues (must fix)",
        Severity::High => "High priority issues (should fix)",
        Severity::Medium => "Medium priority issues",
        Severity::Low => "Low priority issues",
    };
    render(
        "issue_list",
        context! {
            heading,
            issues => &all[..shown],
            omitted => all.len() - shown,
        },
    )
    .map(Some)
}

/// Per-file listing of line findings, or `None` when no file has any.
pub fn line_findings(report: &Report) -> Result<Option<String>> {
    let files: Vec<_> = report
        .files
        .iter()
        .filter(|file| !file.findings.is_empty())
        .collect();
    if files.is_empty() {
        return Ok(None);
    }
    render("line_findings", context! { files => Value::from_serialize(&files) }).map(Some)
}

/// Strengths and improvements collected across files, or `None` when empty.
pub fn strengths(findings: &[FileFindings], limit: Option<usize>) -> Result<Option<String>> {
    let cap = limit.unwrap_or(usize::MAX);
    let strengths: Vec<&str> = findings
        .iter()
        .flat_map(|file| file.strengths.iter().map(String::as_str))
        .take(cap)
        .collect();
    let improvements: Vec<&str> = findings
        .iter()
        .flat_map(|file| file.improvements.iter().map(String::as_str))
        .take(cap)
        .collect();
    if strengths.is_empty() && improvements.is_empty() {
        return Ok(None);
    }
    render("strengths", context! { strengths, improvements }).map(Some)
}

pub fn report_download(report: &Report, filename: &str) -> Result<String> {
    render(
        "report_download",
        context! { report => Value::from_serialize(report), filename },
    )
}

pub fn chat_summary(report: &Report, ticket: &str, repo_url: &str) -> Result<String> {
    render(
        "chat_summary",
        context! { report => Value::from_serialize(report), ticket, repo_url },
    )
}

pub fn ask_for_input(previous_input: &str) -> Result<String> {
    render("ask_for_input", context! { previous_input })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Category, FileReport, Finding};

    fn finding(line: u32, severity: Severity, description: &str) -> Finding {
        Finding {
            line,
            severity,
            category: Category::Security,
            description: description.to_string(),
            suggested_fix: None,
        }
    }

    fn report() -> Report {
        Report {
            overall_score: 81,
            critical_count: 1,
            high_count: 0,
            files_reviewed: 2,
            files: vec![
                FileReport {
                    file: "a.py".to_string(),
                    score: 80,
                    findings: vec![finding(3, Severity::Critical, "sql injection")],
                },
                FileReport {
                    file: "b.py".to_string(),
                    score: 91,
                    findings: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn all_templates_render() {
        let report = report();
        assert!(ticket_description("u", "deep_review").expect("desc").contains("deep_review"));
        assert!(ticket_initiated("u", "i").expect("init").contains("initiated"));
        assert!(chat_start("u", "REV-1", "i").expect("start").contains("REV-1"));
        assert!(ticket_summary(&report, "u", "i").expect("summary").contains("81/100"));
        assert!(report_download(&report, "code_review_REV-1.json")
            .expect("download")
            .contains("code_review_REV-1.json"));
        assert!(chat_summary(&report, "REV-1", "u").expect("chat").contains("Critical issues: 1"));
        assert!(ask_for_input("hello").expect("ask").contains("\"hello\""));
    }

    #[test]
    fn clone_summary_names_first_files_and_counts_rest() {
        let files: Vec<String> = (1..=7).map(|i| format!("f{i}.py")).collect();
        let text = clone_summary(&files).expect("render");
        assert!(text.contains("7 files selected"));
        assert!(text.contains("`f5.py`"));
        assert!(!text.contains("`f6.py`"));
        assert!(text.contains("and 2 more"));
    }

    #[test]
    fn issue_list_is_absent_without_matches() {
        let report = report();
        assert_eq!(issue_list(&report, Severity::High, None).expect("high"), None);
        let critical = issue_list(&report, Severity::Critical, Some(CHAT_ISSUE_LIMIT))
            .expect("critical")
            .expect("some");
        assert!(critical.contains("SECURITY in `a.py` (line 3)"));
        assert!(critical.contains("Fix: n/a"));
    }

    #[test]
    fn line_findings_skip_clean_files() {
        let text = line_findings(&report()).expect("render").expect("some");
        assert!(text.contains("`a.py` (score 80)"));
        assert!(!text.contains("b.py"));
    }

    #[test]
    fn strengths_respect_limit() {
        let mut file = FileFindings::degraded("a.py");
        file.strengths = vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()];
        let text = strengths(&[file], Some(CHAT_HIGHLIGHT_LIMIT))
            .expect("render")
            .expect("some");
        assert!(text.contains("- s3"));
        assert!(!text.contains("- s4"));
        assert_eq!(strengths(&[], None).expect("render"), None);
    }
}
