//! Language-model collaborator seams.
//!
//! Steps depend on these narrow traits only. The command-backed
//! implementation lives in [`crate::io::llm`]; tests use scripted fakes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::types::Finding;

/// Request fields extracted from free-form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedRequest {
    pub repo_url: Option<String>,
    pub review_intent: Option<String>,
}

/// Result of analyzing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Score in `0..=100`. Larger values are clamped by the caller.
    pub score: u32,
    #[serde(default, alias = "issues")]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// Extracts the repository URL and review intent from a request.
pub trait IntentParser: Send + Sync {
    fn parse_request(&self, raw_input: &str) -> Result<ParsedRequest>;
}

/// Scores one source file and lists its issues.
pub trait Analyzer: Send + Sync {
    /// `content` is the line-numbered excerpt prepared by the review step.
    fn analyze_file(&self, path: &str, content: &str) -> Result<FileAnalysis>;
}
