//! Write-once and monotonicity checks for step transitions.
//!
//! The executor runs these after every successful step, before adopting the
//! returned state. Violations are reported as human-readable strings so they
//! can be joined into a single error message.

use crate::core::state::ReviewState;
use crate::core::types::StepKind;

/// Validate the transition `prev -> next` produced by `step`.
///
/// Rules:
/// - set fields keep their value (only `AskForInput` may clear the
///   input-derived fields, and only before a ticket exists)
/// - done flags are never reset
/// - `ask_repeat_count` moves only on `AskForInput`, by exactly one
/// - `files_to_review` respects `max_files`
/// - `findings` line up with `files_to_review` by index and file name
/// - steps never write `error`
pub fn check_transition(
    prev: &ReviewState,
    next: &ReviewState,
    step: StepKind,
    max_files: usize,
) -> Vec<String> {
    let mut errors = Vec::new();

    if step == StepKind::AskForInput {
        check_ask_transition(prev, next, &mut errors);
    } else {
        if next.raw_input != prev.raw_input {
            errors.push("raw_input changed outside ask_for_input".to_string());
        }
        if next.ask_repeat_count != prev.ask_repeat_count {
            errors.push("ask_repeat_count changed outside ask_for_input".to_string());
        }
        write_once(&mut errors, "repo_url", &prev.repo_url, &next.repo_url);
        write_once(
            &mut errors,
            "review_intent",
            &prev.review_intent,
            &next.review_intent,
        );
        write_once(
            &mut errors,
            "is_valid_repo",
            &prev.is_valid_repo,
            &next.is_valid_repo,
        );
    }

    write_once(&mut errors, "ticket_id", &prev.ticket_id, &next.ticket_id);
    write_once(
        &mut errors,
        "chat_thread_id",
        &prev.chat_thread_id,
        &next.chat_thread_id,
    );
    write_once(&mut errors, "repo_path", &prev.repo_path, &next.repo_path);
    write_once(
        &mut errors,
        "files_to_review",
        &prev.files_to_review,
        &next.files_to_review,
    );
    write_once(&mut errors, "findings", &prev.findings, &next.findings);
    write_once(&mut errors, "report", &prev.report, &next.report);

    never_reset(&mut errors, "review_started", prev.review_started, next.review_started);
    never_reset(&mut errors, "ticket_updated", prev.ticket_updated, next.ticket_updated);
    never_reset(&mut errors, "chat_updated", prev.chat_updated, next.chat_updated);

    if next.error != prev.error {
        errors.push(format!("{step} wrote the error field"));
    }

    if let Some(files) = &next.files_to_review
        && files.len() > max_files
    {
        errors.push(format!(
            "files_to_review has {} entries (max {max_files})",
            files.len()
        ));
    }

    if prev.findings.is_none()
        && let Some(findings) = &next.findings
    {
        let files = next.files_to_review.as_deref().unwrap_or_default();
        let keyed = findings.len() == files.len()
            && findings
                .iter()
                .zip(files)
                .all(|(finding, file)| &finding.file == file);
        if !keyed {
            errors.push("findings do not match files_to_review order".to_string());
        }
    }

    errors
}

fn check_ask_transition(prev: &ReviewState, next: &ReviewState, errors: &mut Vec<String>) {
    if prev.ticket_id.is_some() {
        errors.push("ask_for_input after a ticket was created".to_string());
    }
    if prev.is_valid_repo == Some(true) {
        errors.push("ask_for_input for a valid repository".to_string());
    }
    if next.ask_repeat_count != prev.ask_repeat_count + 1 {
        errors.push(format!(
            "ask_repeat_count must advance by one (was {}, now {})",
            prev.ask_repeat_count, next.ask_repeat_count
        ));
    }
    if next.repo_url.is_some() || next.review_intent.is_some() || next.is_valid_repo.is_some() {
        errors.push("ask_for_input must clear parsed input fields".to_string());
    }
}

fn write_once<T: PartialEq>(
    errors: &mut Vec<String>,
    field: &str,
    prev: &Option<T>,
    next: &Option<T>,
) {
    match (prev, next) {
        (Some(_), None) => errors.push(format!("{field} was unset after being set")),
        (Some(before), Some(after)) if before != after => {
            errors.push(format!("{field} changed after being set"));
        }
        _ => {}
    }
}

fn never_reset(errors: &mut Vec<String>, field: &str, prev: bool, next: bool) {
    if prev && !next {
        errors.push(format!("{field} was reset"));
    }
}
