//! Scripted collaborators and state builders for tests.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Result, anyhow};

use crate::core::state::ReviewState;
use crate::core::types::{FileFindings, Finding, TicketStatus};
use crate::io::analyzer::{Analyzer, FileAnalysis, IntentParser, ParsedRequest};
use crate::io::chat::ChatPlatform;
use crate::io::input::{InputRequest, InputSource};
use crate::io::tracker::{IssueTracker, NewTicket};
use crate::io::vcs::Vcs;
use crate::step::Collaborators;

/// Parser that never finds anything, leaving URL extraction to the regex fallback.
#[derive(Debug, Default)]
pub struct FallbackParser {
    pub calls: AtomicU32,
}

impl IntentParser for FallbackParser {
    fn parse_request(&self, _raw_input: &str) -> Result<ParsedRequest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ParsedRequest::default())
    }
}

/// One recorded tracker or chat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateTicket(String),
    Transition(String, TicketStatus),
    Comment(String, String),
    Attach(String, String),
    OpenThread(String),
    Post(String, String),
    Upload(String, String),
}

/// Tracker that records calls and can be told to fail one operation.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    pub calls: Mutex<Vec<Call>>,
    pub attachments: Mutex<HashMap<String, Vec<u8>>>,
    /// Operation name (`create`, `transition`, `comment`, `attach`) that fails.
    pub fail_on: Option<&'static str>,
    next_key: AtomicU32,
}

impl RecordingTracker {
    pub fn failing(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, op: &str, call: Call) -> Result<()> {
        if self.fail_on == Some(op) {
            return Err(anyhow!("tracker {op} unavailable"));
        }
        self.calls.lock().expect("calls lock").push(call);
        Ok(())
    }
}

impl IssueTracker for RecordingTracker {
    fn create_ticket(&self, ticket: &NewTicket) -> Result<String> {
        let key = format!("REV-{}", self.next_key.fetch_add(1, Ordering::SeqCst) + 1);
        self.record("create", Call::CreateTicket(ticket.title.clone()))?;
        Ok(key)
    }

    fn transition(&self, key: &str, status: TicketStatus) -> Result<()> {
        self.record("transition", Call::Transition(key.to_string(), status))
    }

    fn post_comment(&self, key: &str, text: &str) -> Result<()> {
        self.record("comment", Call::Comment(key.to_string(), text.to_string()))
    }

    fn attach_file(&self, key: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        self.record("attach", Call::Attach(key.to_string(), filename.to_string()))?;
        self.attachments
            .lock()
            .expect("attachments lock")
            .insert(filename.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Chat platform that records calls and can be told to fail one operation.
#[derive(Debug, Default)]
pub struct RecordingChat {
    pub calls: Mutex<Vec<Call>>,
    pub uploads: Mutex<HashMap<String, Vec<u8>>>,
    /// Operation name (`open`, `post`, `upload`) that fails.
    pub fail_on: Option<&'static str>,
    next_thread: AtomicU32,
}

impl RecordingChat {
    pub fn failing(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, op: &str, call: Call) -> Result<()> {
        if self.fail_on == Some(op) {
            return Err(anyhow!("chat {op} unavailable"));
        }
        self.calls.lock().expect("calls lock").push(call);
        Ok(())
    }
}

impl ChatPlatform for RecordingChat {
    fn open_thread(&self, message: &str) -> Result<String> {
        let thread = format!("thread-{}", self.next_thread.fetch_add(1, Ordering::SeqCst) + 1);
        self.record("open", Call::OpenThread(message.to_string()))?;
        Ok(thread)
    }

    fn post_message(&self, thread: &str, text: &str) -> Result<()> {
        self.record("post", Call::Post(thread.to_string(), text.to_string()))
    }

    fn upload_file(&self, thread: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        self.record("upload", Call::Upload(thread.to_string(), filename.to_string()))?;
        self.uploads
            .lock()
            .expect("uploads lock")
            .insert(filename.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// VCS that "clones" by writing fixed files into a fresh directory.
#[derive(Debug)]
pub struct FakeVcs {
    root: PathBuf,
    files: Vec<(String, String)>,
    clones: AtomicU32,
    pub fail_clone: bool,
}

impl FakeVcs {
    pub fn new(root: &Path, files: &[(&str, &str)]) -> Self {
        Self {
            root: root.to_path_buf(),
            files: files
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect(),
            clones: AtomicU32::new(0),
            fail_clone: false,
        }
    }

    pub fn clone_count(&self) -> u32 {
        self.clones.load(Ordering::SeqCst)
    }
}

impl Vcs for FakeVcs {
    fn clone_repo(&self, _url: &str) -> Result<PathBuf> {
        if self.fail_clone {
            return Err(anyhow!("remote hung up"));
        }
        let n = self.clones.fetch_add(1, Ordering::SeqCst) + 1;
        let dir = self.root.join(format!("clone-{n}"));
        for (name, body) in &self.files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, body)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn list_source_files(&self, _path: &Path, max: usize) -> Result<Vec<String>> {
        Ok(self
            .files
            .iter()
            .map(|(name, _)| name.clone())
            .take(max)
            .collect())
    }
}

/// Analyzer with a fixed score, scripted findings and files that fail.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    pub scores: HashMap<String, u32>,
    pub findings: HashMap<String, Vec<Finding>>,
    pub strengths: Vec<String>,
    pub failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn failing(files: &[&str]) -> Self {
        Self {
            failing: files.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Analyzer for ScriptedAnalyzer {
    fn analyze_file(&self, path: &str, _content: &str) -> Result<FileAnalysis> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(path.to_string());
        if self.failing.iter().any(|f| f == path) {
            return Err(anyhow!("model refused {path}"));
        }
        Ok(FileAnalysis {
            score: self.scores.get(path).copied().unwrap_or(90),
            findings: self.findings.get(path).cloned().unwrap_or_default(),
            strengths: self.strengths.clone(),
            improvements: Vec::new(),
        })
    }
}

/// Input source that replays queued answers, then reports nothing available.
#[derive(Debug, Default)]
pub struct QueuedInput {
    answers: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<InputRequest>>,
}

impl QueuedInput {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl InputSource for QueuedInput {
    fn request_input(&self, request: &InputRequest) -> Result<Option<String>> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        Ok(self.answers.lock().expect("answers lock").pop_front())
    }
}

/// A full set of fakes.
pub struct Fakes {
    pub parser: FallbackParser,
    pub tracker: RecordingTracker,
    pub chat: RecordingChat,
    pub vcs: FakeVcs,
    pub analyzer: ScriptedAnalyzer,
    pub input: QueuedInput,
}

impl Fakes {
    /// Fakes whose repository contains `files`, cloned below `root`.
    pub fn new(root: &Path, files: &[(&str, &str)]) -> Self {
        Self {
            parser: FallbackParser::default(),
            tracker: RecordingTracker::default(),
            chat: RecordingChat::default(),
            vcs: FakeVcs::new(root, files),
            analyzer: ScriptedAnalyzer::default(),
            input: QueuedInput::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            parser: &self.parser,
            tracker: &self.tracker,
            chat: &self.chat,
            vcs: &self.vcs,
            analyzer: &self.analyzer,
            input: &self.input,
        }
    }
}

pub const REPO_URL: &str = "https://github.com/org/repo";

/// State right after a valid request was parsed and validated.
pub fn validated_state() -> ReviewState {
    ReviewState {
        repo_url: Some(REPO_URL.to_string()),
        review_intent: Some("deep_review".to_string()),
        is_valid_repo: Some(true),
        ..ReviewState::new(format!("review {REPO_URL}"))
    }
}

/// State with ticket, thread and clone in place, ready for `DeepReview`.
pub fn cloned_state(repo_path: &Path, files: &[&str]) -> ReviewState {
    ReviewState {
        ticket_id: Some("REV-1".to_string()),
        chat_thread_id: Some("thread-1".to_string()),
        repo_path: Some(repo_path.to_string_lossy().into_owned()),
        files_to_review: Some(files.iter().map(|f| f.to_string()).collect()),
        review_started: true,
        ..validated_state()
    }
}

/// Non-degraded findings entry with the given score.
pub fn file_findings(file: &str, score: u8, issues: Vec<Finding>) -> FileFindings {
    FileFindings {
        file: file.to_string(),
        score,
        issues,
        strengths: Vec::new(),
        improvements: Vec::new(),
        degraded: false,
    }
}
