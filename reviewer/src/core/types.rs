//! Shared deterministic types for the review workflow core.
//!
//! These types define stable contracts between the router, the steps and the
//! persisted artifacts. They must not depend on external state or I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue severity reported by the analysis collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Issue category. Serialized as the `type` field of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Security,
    Performance,
    Quality,
    Pattern,
    ErrorHandling,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Quality => "quality",
            Category::Pattern => "pattern",
            Category::ErrorHandling => "error-handling",
        }
    }
}

/// One issue found in one file.
///
/// Field names on the wire follow the report format (`type`, `issue`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line number; 0 for file-level issues.
    pub line: u32,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(rename = "issue")]
    pub description: String,
    pub suggested_fix: Option<String>,
}

impl Finding {
    /// Placeholder recorded when a file could not be analyzed.
    pub fn analysis_failed() -> Self {
        Self {
            line: 0,
            severity: Severity::Low,
            category: Category::Quality,
            description: "analysis failed".to_string(),
            suggested_fix: None,
        }
    }
}

/// Per-file analysis result stored in the workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFindings {
    /// Path relative to the clone root, as discovered by `CloneRepo`.
    pub file: String,
    /// File score in `0..=100`.
    pub score: u8,
    pub issues: Vec<Finding>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    /// True when the entry is the placeholder for a failed analysis.
    #[serde(default)]
    pub degraded: bool,
}

impl FileFindings {
    pub fn degraded(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            score: 0,
            issues: vec![Finding::analysis_failed()],
            strengths: Vec::new(),
            improvements: Vec::new(),
            degraded: true,
        }
    }
}

/// Per-file section of the published report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub score: u8,
    #[serde(rename = "issues")]
    pub findings: Vec<Finding>,
}

/// Aggregated review result. Built once by `GenerateReport`, never mutated.
///
/// The serialized shape is the attachment format shared with the issue
/// tracker and the chat platform, so field order and names are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub overall_score: u8,
    #[serde(rename = "critical_issues_count")]
    pub critical_count: usize,
    #[serde(rename = "high_issues_count")]
    pub high_count: usize,
    pub files_reviewed: usize,
    #[serde(rename = "findings")]
    pub files: Vec<FileReport>,
}

impl Report {
    /// Iterate over every finding of the given severity, paired with its file.
    pub fn issues_with_severity(
        &self,
        severity: Severity,
    ) -> impl Iterator<Item = (&str, &Finding)> + '_ {
        self.files.iter().flat_map(move |file| {
            file.findings
                .iter()
                .filter(move |finding| finding.severity == severity)
                .map(move |finding| (file.file.as_str(), finding))
        })
    }
}

/// Every unit of work the router can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Parse,
    Validate,
    AskForInput,
    CreateTicket,
    NotifyChat,
    CloneRepo,
    MarkInProgress,
    DeepReview,
    GenerateReport,
    UpdateTicket,
    UpdateChat,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Parse => "parse",
            StepKind::Validate => "validate",
            StepKind::AskForInput => "ask_for_input",
            StepKind::CreateTicket => "create_ticket",
            StepKind::NotifyChat => "notify_chat",
            StepKind::CloneRepo => "clone_repo",
            StepKind::MarkInProgress => "mark_in_progress",
            StepKind::DeepReview => "deep_review",
            StepKind::GenerateReport => "generate_report",
            StepKind::UpdateTicket => "update_ticket",
            StepKind::UpdateChat => "update_chat",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy shared by step failures and halted runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unusable request input. Absorbed by the re-ask loop until it runs out.
    Input,
    /// An external collaborator call failed. Never retried by the core.
    Collaborator,
    /// Too many invalid inputs, or the iteration ceiling was hit.
    BudgetExceeded,
    /// A single file could not be analyzed. Recorded as degraded data.
    PartialAnalysis,
    /// A step returned a state that breaks the write-once rules.
    Invariant,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::Collaborator => "collaborator",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::PartialAnalysis => "partial_analysis",
            ErrorKind::Invariant => "invariant",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last fatal error of a run, as persisted in the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Step that failed; `None` when the run was halted by a budget.
    pub step: Option<StepKind>,
    pub kind: ErrorKind,
    pub reason: String,
    /// Whether the failing step left the state untouched.
    pub state_unchanged: bool,
}

/// Issue-tracker workflow statuses the core transitions through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    ToDo,
    InProgress,
    InReview,
    Done,
}
