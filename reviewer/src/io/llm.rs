//! Language-model adapter that pipes rendered prompts to a command.
//!
//! The command reads the prompt on stdin and prints a JSON object on stdout
//! (optionally inside a fenced code block). Both [`IntentParser`] and
//! [`Analyzer`] are implemented on top of the same invocation.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context};
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::io::analyzer::{Analyzer, FileAnalysis, IntentParser, ParsedRequest};
use crate::io::config::LlmConfig;
use crate::io::process::run_command_with_timeout;

const PARSE_REQUEST_TEMPLATE: &str = include_str!("prompts/parse_request.md");
const ANALYZE_FILE_TEMPLATE: &str = include_str!("prompts/analyze_file.md");

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced json regex should compile")
});

/// Prompt-driven collaborator backed by an external command.
pub struct CommandLlm {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    env: Environment<'static>,
}

impl CommandLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(anyhow!("llm.command must be a non-empty array"));
        }
        let mut env = Environment::new();
        env.add_template("parse_request", PARSE_REQUEST_TEMPLATE)
            .context("load parse_request prompt")?;
        env.add_template("analyze_file", ANALYZE_FILE_TEMPLATE)
            .context("load analyze_file prompt")?;
        Ok(Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            env,
        })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))
    }

    #[instrument(skip_all, fields(program = %self.command[0]))]
    fn invoke(&self, prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run {}", self.command[0]))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "llm command timed out");
            return Err(anyhow!("llm command timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            let stderr = output.stderr_lossy();
            warn!(exit_code = ?output.status.code(), "llm command failed");
            return Err(anyhow!(
                "llm command failed with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            ));
        }
        debug!(bytes = output.stdout.len(), "llm command completed");
        Ok(output.stdout_lossy())
    }

    fn invoke_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let stdout = self.invoke(prompt)?;
        decode_json(&stdout)
    }
}

fn decode_json<T: DeserializeOwned>(stdout: &str) -> Result<T> {
    let json = extract_json_object(stdout)
        .ok_or_else(|| anyhow!("llm output contained no JSON object"))?;
    serde_json::from_str(json).context("parse llm JSON output")
}

impl IntentParser for CommandLlm {
    /// Undecodable output yields an empty request so the caller can fall
    /// back to extracting the URL itself. Command failures are still errors.
    fn parse_request(&self, raw_input: &str) -> Result<ParsedRequest> {
        let prompt = self.render("parse_request", context! { raw_input => raw_input.trim() })?;
        let stdout = self.invoke(&prompt)?;
        match decode_json(&stdout) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                warn!(err = format!("{err:#}"), "undecodable parse_request output, ignoring");
                Ok(ParsedRequest::default())
            }
        }
    }
}

impl Analyzer for CommandLlm {
    fn analyze_file(&self, path: &str, content: &str) -> Result<FileAnalysis> {
        let prompt = self.render("analyze_file", context! { path => path, content => content })?;
        self.invoke_json(&prompt)
            .with_context(|| format!("analyze {path}"))
    }
}

/// Locate the JSON object in model output.
///
/// Prefers a fenced code block; otherwise takes the span from the first `{`
/// to the last `}`.
pub fn extract_json_object(output: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON_RE.captures(output)
        && let Some(body) = caps.get(1)
    {
        return Some(body.as_str());
    }
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (end > start).then(|| &output[start..=end])
}
