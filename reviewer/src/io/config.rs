//! Review configuration stored under `.reviewer/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::router::RoutePolicy;
use crate::core::scoring::DEFAULT_CRITICAL_PENALTY;
use crate::core::types::TicketStatus;

/// Review configuration (TOML).
///
/// Passed explicitly into the executor; nothing reads it from globals.
/// Missing fields default to the values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Maximum number of files handed to the analyzer.
    pub max_files: usize,

    /// How many times corrected input may be requested for an invalid repository.
    pub max_input_retries: u32,

    /// Hard ceiling on executed steps per run.
    pub max_iterations: u32,

    /// Points subtracted from the overall score per critical issue.
    pub critical_penalty: u32,

    /// File extensions eligible for review (without the dot).
    pub source_extensions: Vec<String>,

    /// Directory names never descended into when listing files.
    pub skip_dirs: Vec<String>,

    /// Parent directory for per-run clones. System temp dir when unset.
    pub clone_root: Option<PathBuf>,

    /// Directory holding run state, iteration logs and the local outboxes.
    pub state_dir: PathBuf,

    pub statuses: StatusNames,

    pub llm: LlmConfig,
}

/// Display names of the issue-tracker statuses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusNames {
    pub to_do: String,
    pub in_progress: String,
    pub in_review: String,
    pub done: String,
}

impl StatusNames {
    pub fn name(&self, status: TicketStatus) -> &str {
        match status {
            TicketStatus::ToDo => &self.to_do,
            TicketStatus::InProgress => &self.in_progress,
            TicketStatus::InReview => &self.in_review,
            TicketStatus::Done => &self.done,
        }
    }
}

impl Default for StatusNames {
    fn default() -> Self {
        Self {
            to_do: "To Do".to_string(),
            in_progress: "In Progress".to_string(),
            in_review: "In Review".to_string(),
            done: "Done".to_string(),
        }
    }
}

/// Language-model command settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    /// Command that reads a prompt on stdin and prints JSON on stdout.
    pub command: Vec<String>,

    /// Per-call wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Lines of each file sent for analysis.
    pub max_lines_per_file: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 1_000_000,
            max_lines_per_file: 100,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_input_retries: 3,
            max_iterations: 50,
            critical_penalty: DEFAULT_CRITICAL_PENALTY,
            source_extensions: ["py", "rs", "go", "js", "ts", "java", "rb"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            skip_dirs: [".git", "node_modules", "target", "vendor", "venv", ".venv"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            clone_root: None,
            state_dir: PathBuf::from(".reviewer"),
            statuses: StatusNames::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl ReviewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(anyhow!("max_files must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.source_extensions.is_empty() {
            return Err(anyhow!("source_extensions must not be empty"));
        }
        if self.llm.command.is_empty() || self.llm.command[0].trim().is_empty() {
            return Err(anyhow!("llm.command must be a non-empty array"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be > 0"));
        }
        if self.llm.output_limit_bytes == 0 {
            return Err(anyhow!("llm.output_limit_bytes must be > 0"));
        }
        if self.llm.max_lines_per_file == 0 {
            return Err(anyhow!("llm.max_lines_per_file must be > 0"));
        }
        Ok(())
    }

    pub fn route_policy(&self) -> RoutePolicy {
        RoutePolicy {
            max_input_retries: self.max_input_retries,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ReviewConfig::default()`.
pub fn load_config(path: &Path) -> Result<ReviewConfig> {
    if !path.exists() {
        let cfg = ReviewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ReviewConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ReviewConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
