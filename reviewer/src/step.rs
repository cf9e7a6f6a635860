//! Execution of a single workflow step.
//!
//! Every step reads the current state and builds a new one. The new state is
//! only returned when all of the step's side effects succeeded, so a failing
//! step always leaves the caller's state untouched.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::repo_url::{extract_repo_url, is_valid_repo_url};
use crate::core::scoring::build_report;
use crate::core::state::ReviewState;
use crate::core::types::{ErrorInfo, ErrorKind, FileFindings, Severity, StepKind, TicketStatus};
use crate::io::analyzer::{Analyzer, IntentParser};
use crate::io::chat::ChatPlatform;
use crate::io::config::ReviewConfig;
use crate::io::input::{InputRequest, InputSource};
use crate::io::messages;
use crate::io::report_file::{render_report_json, report_filename};
use crate::io::tracker::{IssueTracker, NewTicket};
use crate::io::vcs::Vcs;

/// Intent recorded when the request does not name one.
pub const DEFAULT_INTENT: &str = "deep_review";

/// External collaborators a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub parser: &'a dyn IntentParser,
    pub tracker: &'a dyn IssueTracker,
    pub chat: &'a dyn ChatPlatform,
    pub vcs: &'a dyn Vcs,
    pub analyzer: &'a dyn Analyzer,
    pub input: &'a dyn InputSource,
}

/// Failure of one step. The state passed to the step is left unchanged.
#[derive(Debug, Error)]
#[error("{step} failed ({kind}): {message}")]
pub struct StepError {
    pub step: StepKind,
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StepError {
    pub fn collaborator(step: StepKind, action: &str, err: anyhow::Error) -> Self {
        Self {
            step,
            kind: ErrorKind::Collaborator,
            message: format!("{action}: {err:#}"),
            source: Some(err.into()),
        }
    }

    pub fn invariant(step: StepKind, message: impl Into<String>) -> Self {
        Self {
            step,
            kind: ErrorKind::Invariant,
            message: message.into(),
            source: None,
        }
    }

    /// Persistable form of this error.
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            step: Some(self.step),
            kind: self.kind,
            reason: self.message.clone(),
            state_unchanged: true,
        }
    }
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    /// The step completed; adopt this state.
    Advanced(ReviewState),
    /// Corrected input is required and none is available yet.
    Suspended(InputRequest),
}

/// Run `step` against `state`.
#[instrument(skip_all, fields(step = %step))]
pub fn execute_step(
    step: StepKind,
    state: &ReviewState,
    collab: &Collaborators<'_>,
    config: &ReviewConfig,
) -> Result<StepOutput, StepError> {
    let next = match step {
        StepKind::Parse => parse(state, collab.parser)?,
        StepKind::Validate => validate(state),
        StepKind::AskForInput => {
            return ask_for_input(state, collab.input, config.max_input_retries);
        }
        StepKind::CreateTicket => create_ticket(state, collab.tracker)?,
        StepKind::NotifyChat => notify_chat(state, collab.chat)?,
        StepKind::CloneRepo => clone_repo(state, collab.vcs, config.max_files)?,
        StepKind::MarkInProgress => mark_in_progress(state, collab.tracker, collab.chat)?,
        StepKind::DeepReview => {
            deep_review(state, collab.analyzer, config.llm.max_lines_per_file)?
        }
        StepKind::GenerateReport => generate_report(state, config.critical_penalty)?,
        StepKind::UpdateTicket => update_ticket(state, collab.tracker)?,
        StepKind::UpdateChat => update_chat(state, collab.chat)?,
    };
    Ok(StepOutput::Advanced(next))
}

fn required<'s, T: ?Sized>(
    step: StepKind,
    field: &str,
    value: Option<&'s T>,
) -> Result<&'s T, StepError> {
    value.ok_or_else(|| StepError::invariant(step, format!("{field} is not set")))
}

fn collaborator(step: StepKind, action: &'static str) -> impl FnOnce(anyhow::Error) -> StepError {
    move |err| StepError::collaborator(step, action, err)
}

fn rendered(step: StepKind, result: anyhow::Result<String>) -> Result<String, StepError> {
    result.map_err(collaborator(step, "render message"))
}

fn intent_of(state: &ReviewState) -> &str {
    state.review_intent.as_deref().unwrap_or(DEFAULT_INTENT)
}

/// Extract the repository URL and intent from the raw input.
///
/// When the parser returns no URL, the raw input is scanned for one. A
/// missing URL is not an error: validation turns it into a re-ask.
pub fn parse(state: &ReviewState, parser: &dyn IntentParser) -> Result<ReviewState, StepError> {
    let parsed = parser
        .parse_request(&state.raw_input)
        .map_err(collaborator(StepKind::Parse, "parse request"))?;

    let repo_url = parsed
        .repo_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .or_else(|| extract_repo_url(&state.raw_input));
    let review_intent = parsed
        .review_intent
        .map(|intent| intent.trim().to_string())
        .filter(|intent| !intent.is_empty())
        .unwrap_or_else(|| DEFAULT_INTENT.to_string());
    debug!(repo_url = ?repo_url, intent = %review_intent, "request parsed");

    Ok(ReviewState {
        repo_url,
        review_intent: Some(review_intent),
        ..state.clone()
    })
}

pub fn validate(state: &ReviewState) -> ReviewState {
    let valid = state.repo_url.as_deref().is_some_and(is_valid_repo_url);
    debug!(valid, "repository url checked");
    ReviewState {
        is_valid_repo: Some(valid),
        ..state.clone()
    }
}

/// Request corrected input and reset the input-derived fields.
pub fn ask_for_input(
    state: &ReviewState,
    input: &dyn InputSource,
    max_attempts: u32,
) -> Result<StepOutput, StepError> {
    let step = StepKind::AskForInput;
    let request = InputRequest {
        prompt: rendered(step, messages::ask_for_input(&state.raw_input))?,
        previous_input: state.raw_input.clone(),
        attempt: state.ask_repeat_count + 1,
        max_attempts,
    };
    let answer = input
        .request_input(&request)
        .map_err(collaborator(step, "request input"))?;
    let Some(raw_input) = answer else {
        info!(attempt = request.attempt, "no corrected input available, suspending");
        return Ok(StepOutput::Suspended(request));
    };
    info!(attempt = request.attempt, "corrected input received");
    Ok(StepOutput::Advanced(ReviewState {
        raw_input,
        repo_url: None,
        review_intent: None,
        is_valid_repo: None,
        ask_repeat_count: state.ask_repeat_count + 1,
        ..state.clone()
    }))
}

pub fn create_ticket(
    state: &ReviewState,
    tracker: &dyn IssueTracker,
) -> Result<ReviewState, StepError> {
    let step = StepKind::CreateTicket;
    if state.ticket_id.is_some() {
        debug!("ticket already exists, skipping");
        return Ok(state.clone());
    }
    let repo_url = required(step, "repo_url", state.repo_url.as_deref())?;
    let intent = intent_of(state);
    let ticket = NewTicket {
        title: messages::ticket_title(state.repo_name().unwrap_or(repo_url)),
        description: rendered(step, messages::ticket_description(repo_url, intent))?,
        repo_url: repo_url.to_string(),
        labels: vec!["review".to_string(), "ai".to_string(), intent.to_string()],
    };
    let key = tracker
        .create_ticket(&ticket)
        .map_err(collaborator(step, "create ticket"))?;
    tracker
        .transition(&key, TicketStatus::InProgress)
        .map_err(collaborator(step, "transition ticket"))?;
    let comment = rendered(step, messages::ticket_initiated(repo_url, intent))?;
    tracker
        .post_comment(&key, &comment)
        .map_err(collaborator(step, "post ticket comment"))?;
    info!(ticket = %key, "ticket created");

    Ok(ReviewState {
        ticket_id: Some(key),
        ..state.clone()
    })
}

pub fn notify_chat(state: &ReviewState, chat: &dyn ChatPlatform) -> Result<ReviewState, StepError> {
    let step = StepKind::NotifyChat;
    if state.chat_thread_id.is_some() {
        debug!("chat thread already exists, skipping");
        return Ok(state.clone());
    }
    let repo_url = required(step, "repo_url", state.repo_url.as_deref())?;
    let ticket = required(step, "ticket_id", state.ticket_id.as_deref())?;
    let message = rendered(step, messages::chat_start(repo_url, ticket, intent_of(state)))?;

    let thread = chat
        .open_thread(&message)
        .map_err(collaborator(step, "open chat thread"))?;
    chat.post_message(&thread, messages::CHAT_PROGRESS)
        .map_err(collaborator(step, "post chat message"))?;
    info!(thread = %thread, "chat thread opened");

    Ok(ReviewState {
        chat_thread_id: Some(thread),
        ..state.clone()
    })
}

/// Clone the repository and pick the files to review.
///
/// The clone is removed again if file discovery fails.
pub fn clone_repo(
    state: &ReviewState,
    vcs: &dyn Vcs,
    max_files: usize,
) -> Result<ReviewState, StepError> {
    let step = StepKind::CloneRepo;
    if state.repo_path.is_some() {
        debug!("repository already cloned, skipping");
        return Ok(state.clone());
    }
    let repo_url = required(step, "repo_url", state.repo_url.as_deref())?;
    let path = vcs
        .clone_repo(repo_url)
        .map_err(collaborator(step, "clone repository"))?;
    let mut files = match vcs.list_source_files(&path, max_files) {
        Ok(files) => files,
        Err(err) => {
            remove_clone(&path);
            return Err(StepError::collaborator(step, "list source files", err));
        }
    };
    files.truncate(max_files);
    info!(path = %path.display(), files = files.len(), "repository ready");

    Ok(ReviewState {
        repo_path: Some(path.to_string_lossy().into_owned()),
        files_to_review: Some(files),
        ..state.clone()
    })
}

/// Release what a step produced when its transition is rejected.
pub(crate) fn discard_rejected(step: StepKind, prev: &ReviewState, next: &ReviewState) {
    if step == StepKind::CloneRepo
        && prev.repo_path.is_none()
        && let Some(path) = &next.repo_path
    {
        remove_clone(Path::new(path));
    }
}

fn remove_clone(path: &Path) {
    if let Err(err) = fs::remove_dir_all(path) {
        warn!(path = %path.display(), err = %err, "failed to remove clone");
    }
}

pub fn mark_in_progress(
    state: &ReviewState,
    tracker: &dyn IssueTracker,
    chat: &dyn ChatPlatform,
) -> Result<ReviewState, StepError> {
    let step = StepKind::MarkInProgress;
    if state.review_started {
        debug!("review already started, skipping");
        return Ok(state.clone());
    }
    let ticket = required(step, "ticket_id", state.ticket_id.as_deref())?;
    let thread = required(step, "chat_thread_id", state.chat_thread_id.as_deref())?;
    let files = required(step, "files_to_review", state.files_to_review.as_deref())?;
    let summary = rendered(step, messages::clone_summary(files))?;

    tracker
        .transition(ticket, TicketStatus::InReview)
        .map_err(collaborator(step, "transition ticket"))?;
    tracker
        .post_comment(ticket, &summary)
        .map_err(collaborator(step, "post ticket comment"))?;
    chat.post_message(thread, &summary)
        .map_err(collaborator(step, "post chat message"))?;

    Ok(ReviewState {
        review_started: true,
        ..state.clone()
    })
}

/// Analyze every selected file, in order.
///
/// A file that cannot be read or analyzed gets a degraded entry; the step
/// itself only fails on missing inputs.
pub fn deep_review(
    state: &ReviewState,
    analyzer: &dyn Analyzer,
    max_lines: usize,
) -> Result<ReviewState, StepError> {
    let step = StepKind::DeepReview;
    if state.findings.is_some() {
        debug!("findings already recorded, skipping");
        return Ok(state.clone());
    }
    let root = Path::new(required(step, "repo_path", state.repo_path.as_deref())?);
    let files = required(step, "files_to_review", state.files_to_review.as_deref())?;

    let mut findings = Vec::with_capacity(files.len());
    for file in files {
        findings.push(review_file(root, file, analyzer, max_lines));
    }
    let degraded = findings.iter().filter(|entry| entry.degraded).count();
    if degraded > 0 {
        warn!(
            kind = %ErrorKind::PartialAnalysis,
            degraded,
            total = findings.len(),
            "some files could not be analyzed"
        );
    }

    Ok(ReviewState {
        findings: Some(findings),
        ..state.clone()
    })
}

fn review_file(root: &Path, file: &str, analyzer: &dyn Analyzer, max_lines: usize) -> FileFindings {
    let bytes = match fs::read(root.join(file)) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(file, err = %err, "failed to read file");
            return FileFindings::degraded(file);
        }
    };
    let content = number_lines(&String::from_utf8_lossy(&bytes), max_lines);
    match analyzer.analyze_file(file, &content) {
        Ok(analysis) => {
            debug!(file, score = analysis.score, issues = analysis.findings.len(), "file analyzed");
            FileFindings {
                file: file.to_string(),
                score: analysis.score.min(100) as u8,
                issues: analysis.findings,
                strengths: analysis.strengths,
                improvements: analysis.improvements,
                degraded: false,
            }
        }
        Err(err) => {
            warn!(file, err = %format!("{err:#}"), "analysis failed");
            FileFindings::degraded(file)
        }
    }
}

/// Prefix each line with its 1-based number, keeping at most `max_lines`.
pub fn number_lines(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = String::new();
    for (idx, line) in lines.iter().take(max_lines).enumerate() {
        out.push_str(&format!("{:>4}: {line}\n", idx + 1));
    }
    if lines.len() > max_lines {
        out.push_str(&format!("... [{} more lines]\n", lines.len() - max_lines));
    }
    out
}

pub fn generate_report(state: &ReviewState, critical_penalty: u32) -> Result<ReviewState, StepError> {
    let step = StepKind::GenerateReport;
    if state.report.is_some() {
        return Ok(state.clone());
    }
    let findings = required(step, "findings", state.findings.as_deref())?;
    let report = build_report(findings, critical_penalty);
    info!(
        overall_score = report.overall_score,
        critical = report.critical_count,
        high = report.high_count,
        "report built"
    );
    Ok(ReviewState {
        report: Some(report),
        ..state.clone()
    })
}

/// Publish the report to the ticket and close it.
pub fn update_ticket(
    state: &ReviewState,
    tracker: &dyn IssueTracker,
) -> Result<ReviewState, StepError> {
    let step = StepKind::UpdateTicket;
    if state.ticket_updated {
        debug!("ticket already updated, skipping");
        return Ok(state.clone());
    }
    let ticket = required(step, "ticket_id", state.ticket_id.as_deref())?;
    let report = required(step, "report", state.report.as_ref())?;
    let repo_url = state.repo_url.as_deref().unwrap_or_default();
    let findings = state.findings.as_deref().unwrap_or_default();

    let mut comments = vec![rendered(
        step,
        messages::ticket_summary(report, repo_url, intent_of(state)),
    )?];
    for severity in [Severity::Critical, Severity::High] {
        comments.extend(rendered_opt(step, messages::issue_list(report, severity, None))?);
    }
    comments.extend(rendered_opt(step, messages::line_findings(report))?);
    comments.extend(rendered_opt(step, messages::strengths(findings, None))?);

    let filename = report_filename(ticket);
    let json = render_report_json(report)
        .map_err(collaborator(step, "render report"))?;
    let download = rendered(step, messages::report_download(report, &filename))?;

    for comment in &comments {
        tracker
            .post_comment(ticket, comment)
            .map_err(collaborator(step, "post ticket comment"))?;
    }
    tracker
        .attach_file(ticket, &filename, json.as_bytes())
        .map_err(collaborator(step, "attach report"))?;
    tracker
        .post_comment(ticket, &download)
        .map_err(collaborator(step, "post ticket comment"))?;
    tracker
        .transition(ticket, TicketStatus::Done)
        .map_err(collaborator(step, "transition ticket"))?;
    info!(ticket, comments = comments.len() + 1, "ticket updated");

    Ok(ReviewState {
        ticket_updated: true,
        ..state.clone()
    })
}

/// Publish the summary and highlights to the chat thread.
pub fn update_chat(state: &ReviewState, chat: &dyn ChatPlatform) -> Result<ReviewState, StepError> {
    let step = StepKind::UpdateChat;
    if state.chat_updated {
        debug!("chat already updated, skipping");
        return Ok(state.clone());
    }
    let thread = required(step, "chat_thread_id", state.chat_thread_id.as_deref())?;
    let report = required(step, "report", state.report.as_ref())?;
    let ticket = required(step, "ticket_id", state.ticket_id.as_deref())?;
    let repo_url = state.repo_url.as_deref().unwrap_or_default();
    let findings = state.findings.as_deref().unwrap_or_default();

    let mut posts = vec![rendered(step, messages::chat_summary(report, ticket, repo_url))?];
    for severity in [Severity::Critical, Severity::High] {
        posts.extend(rendered_opt(
            step,
            messages::issue_list(report, severity, Some(messages::CHAT_ISSUE_LIMIT)),
        )?);
    }
    posts.extend(rendered_opt(
        step,
        messages::strengths(findings, Some(messages::CHAT_HIGHLIGHT_LIMIT)),
    )?);
    let json = render_report_json(report)
        .map_err(collaborator(step, "render report"))?;

    for post in &posts {
        chat.post_message(thread, post)
            .map_err(collaborator(step, "post chat message"))?;
    }
    chat.upload_file(thread, &report_filename(ticket), json.as_bytes())
        .map_err(collaborator(step, "upload report"))?;
    info!(thread, posts = posts.len(), "chat updated");

    Ok(ReviewState {
        chat_updated: true,
        ..state.clone()
    })
}

fn rendered_opt(
    step: StepKind,
    result: anyhow::Result<Option<String>>,
) -> Result<Option<String>, StepError> {
    result.map_err(collaborator(step, "render message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_lines_caps_and_marks_remainder() {
        let content = "a\nb\nc\n";
        assert_eq!(number_lines(content, 2), "   1: a\n   2: b\n... [1 more lines]\n");
        assert_eq!(number_lines(content, 5), "   1: a\n   2: b\n   3: c\n");
    }

    #[test]
    fn validate_treats_missing_url_as_invalid() {
        let next = validate(&ReviewState::new("hello"));
        assert_eq!(next.is_valid_repo, Some(false));
    }

    #[test]
    fn update_chat_requires_ticket() {
        use crate::core::scoring::{DEFAULT_CRITICAL_PENALTY, build_report};
        use crate::test_support::{RecordingChat, file_findings, validated_state};

        let state = ReviewState {
            chat_thread_id: Some("thread-1".to_string()),
            report: Some(build_report(
                &[file_findings("a.py", 90, Vec::new())],
                DEFAULT_CRITICAL_PENALTY,
            )),
            ..validated_state()
        };
        let chat = RecordingChat::default();
        let err = update_chat(&state, &chat).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Invariant);
        assert_eq!(err.message, "ticket_id is not set");
        assert!(chat.calls().is_empty());
    }

    #[test]
    fn step_error_records_unchanged_state() {
        let err = StepError::collaborator(
            StepKind::CloneRepo,
            "clone repository",
            anyhow::anyhow!("network down"),
        );
        let info = err.to_error_info();
        assert_eq!(info.step, Some(StepKind::CloneRepo));
        assert_eq!(info.kind, ErrorKind::Collaborator);
        assert_eq!(info.reason, "clone repository: network down");
        assert!(info.state_unchanged);
        assert_eq!(
            err.to_string(),
            "clone_repo failed (collaborator): clone repository: network down"
        );
    }
}
