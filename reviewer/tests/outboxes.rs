//! Full runs against the file-backed tracker and chat outboxes.

use std::fs;
use std::path::Path;

use reviewer::core::state::ReviewState;
use reviewer::io::chat::FileChat;
use reviewer::io::config::{ReviewConfig, StatusNames};
use reviewer::io::report_file::render_report_json;
use reviewer::io::tracker::FileTracker;
use reviewer::looping::{CancelToken, LoopOutcome, LoopStop, StepRecord, run_loop};
use reviewer::step::Collaborators;
use reviewer::test_support::Fakes;

const FILES: &[(&str, &str)] = &[("src/app.py", "import os\n"), ("setup.py", "x = 2\n")];

fn run_with_outboxes(root: &Path) -> (LoopOutcome, FileTracker, FileChat) {
    let fakes = Fakes::new(&root.join("clones"), FILES);
    let tracker = FileTracker::new(root.join("tracker"), StatusNames::default());
    let chat = FileChat::new(root.join("chat"));
    let collab = Collaborators {
        tracker: &tracker,
        chat: &chat,
        ..fakes.collaborators()
    };
    let config = ReviewConfig {
        state_dir: root.to_path_buf(),
        ..ReviewConfig::default()
    };
    let outcome = run_loop(
        ReviewState::new("please do a deep review of https://github.com/org/widgets"),
        &collab,
        &config,
        &CancelToken::new(),
        |_: &StepRecord| {},
    );
    (outcome, tracker, chat)
}

/// The ticket ends in Done with its status history, comments and the
/// report attachment; the chat thread carries the same report.
#[test]
fn run_publishes_to_file_outboxes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (outcome, tracker, chat) = run_with_outboxes(temp.path());
    assert_eq!(outcome.stop, LoopStop::Success);

    let key = outcome.state.ticket_id.as_deref().expect("ticket");
    assert_eq!(key, "REV-1");
    let ticket = tracker.ticket(key).expect("ticket record");
    assert_eq!(ticket.title, "AI Code Review: widgets");
    assert_eq!(ticket.repo_url, "https://github.com/org/widgets");
    assert_eq!(ticket.status, "Done");
    assert_eq!(
        ticket.history,
        vec!["In Progress", "In Review", "Done"]
    );

    let comments = tracker.comments(key).expect("comments");
    assert!(comments.iter().any(|c| c.contains("Overall score: 90/100")));
    assert!(
        comments
            .last()
            .expect("last comment")
            .contains("code_review_REV-1.json")
    );

    let report = outcome.state.report.as_ref().expect("report");
    let expected = render_report_json(report).expect("render");
    let attached = fs::read_to_string(
        tracker
            .attachment_path(key, "code_review_REV-1.json")
            .expect("attachment path"),
    )
    .expect("read attachment");
    assert_eq!(attached, expected);

    let thread = outcome.state.chat_thread_id.as_deref().expect("thread");
    let messages = chat.messages(thread).expect("messages");
    assert!(messages[0].contains("https://github.com/org/widgets"));
    let uploaded = fs::read_to_string(chat.upload_path(thread, "code_review_REV-1.json"))
        .expect("read upload");
    assert_eq!(uploaded, expected);
}

/// Identical inputs produce byte-identical reports.
#[test]
fn report_bytes_are_deterministic() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    let (a, tracker_a, _) = run_with_outboxes(first.path());
    let (b, tracker_b, _) = run_with_outboxes(second.path());

    let read = |tracker: &FileTracker| {
        fs::read(
            tracker
                .attachment_path("REV-1", "code_review_REV-1.json")
                .expect("attachment path"),
        )
        .expect("read attachment")
    };
    assert_eq!(a.state.report, b.state.report);
    assert_eq!(read(&tracker_a), read(&tracker_b));
}
