//! The workflow state threaded through every step of a run.

use serde::{Deserialize, Serialize};

use crate::core::types::{ErrorInfo, FileFindings, Report};

/// Single mutable record for one review run.
///
/// Fields start unset and are written by exactly one step each. The router
/// reads only this record to decide what happens next, so a persisted state
/// can be resumed at any point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewState {
    /// Original (or corrected) request text.
    pub raw_input: String,
    pub repo_url: Option<String>,
    pub review_intent: Option<String>,
    pub is_valid_repo: Option<bool>,
    /// Number of times corrected input was requested in this run.
    pub ask_repeat_count: u32,
    pub ticket_id: Option<String>,
    pub chat_thread_id: Option<String>,
    pub repo_path: Option<String>,
    pub files_to_review: Option<Vec<String>>,
    pub review_started: bool,
    pub findings: Option<Vec<FileFindings>>,
    pub report: Option<Report>,
    pub ticket_updated: bool,
    pub chat_updated: bool,
    pub error: Option<ErrorInfo>,
}

impl ReviewState {
    /// Fresh state for a new run.
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            raw_input: raw_input.into(),
            ..Self::default()
        }
    }

    /// Names of the governing fields that are already set, in routing order.
    ///
    /// A successful step must only ever grow this list.
    pub fn progress(&self) -> Vec<&'static str> {
        let mut set = Vec::new();
        if self.repo_url.is_some() {
            set.push("repo_url");
        }
        if self.review_intent.is_some() {
            set.push("review_intent");
        }
        if self.is_valid_repo.is_some() {
            set.push("is_valid_repo");
        }
        if self.ticket_id.is_some() {
            set.push("ticket_id");
        }
        if self.chat_thread_id.is_some() {
            set.push("chat_thread_id");
        }
        if self.repo_path.is_some() {
            set.push("repo_path");
        }
        if self.files_to_review.is_some() {
            set.push("files_to_review");
        }
        if self.review_started {
            set.push("review_started");
        }
        if self.findings.is_some() {
            set.push("findings");
        }
        if self.report.is_some() {
            set.push("report");
        }
        if self.ticket_updated {
            set.push("ticket_updated");
        }
        if self.chat_updated {
            set.push("chat_updated");
        }
        set
    }

    /// Repository name derived from the URL (`https://host/org/repo.git` -> `repo`).
    pub fn repo_name(&self) -> Option<&str> {
        let url = self.repo_url.as_deref()?;
        let trimmed = url.trim_end_matches('/');
        let last = trimmed.rsplit('/').next()?;
        let name = last.strip_suffix(".git").unwrap_or(last);
        (!name.is_empty()).then_some(name)
    }
}
