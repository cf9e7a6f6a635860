//! Deterministic routing for the review workflow.
//!
//! The router is a decision table over [`ReviewState`], evaluated top to
//! bottom with the first match winning. Every branch either selects the step
//! that sets the first unset governing field or halts, so a run terminates
//! after at most ten steps plus three per re-ask cycle.

use crate::core::state::ReviewState;
use crate::core::types::StepKind;

/// Reason reported when the re-ask loop runs out.
pub const TOO_MANY_INVALID_INPUTS: &str = "too many invalid repository inputs";

/// Routing knobs taken from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    /// How many times corrected input may be requested before giving up.
    pub max_input_retries: u32,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            max_input_retries: 3,
        }
    }
}

/// Terminal classification of a halted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Success,
    Failure { reason: String },
}

/// What the executor should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run(StepKind),
    Halt(Halt),
}

/// Select the next step for `state`.
pub fn route(state: &ReviewState, policy: &RoutePolicy) -> Decision {
    if let Some(error) = &state.error {
        return Decision::Halt(Halt::Failure {
            reason: error.reason.clone(),
        });
    }
    if state.repo_url.is_none() && state.review_intent.is_none() {
        return Decision::Run(StepKind::Parse);
    }
    let Some(is_valid) = state.is_valid_repo else {
        return Decision::Run(StepKind::Validate);
    };
    if !is_valid {
        if state.ask_repeat_count < policy.max_input_retries {
            return Decision::Run(StepKind::AskForInput);
        }
        return Decision::Halt(Halt::Failure {
            reason: TOO_MANY_INVALID_INPUTS.to_string(),
        });
    }
    if state.ticket_id.is_none() {
        return Decision::Run(StepKind::CreateTicket);
    }
    if state.chat_thread_id.is_none() {
        return Decision::Run(StepKind::NotifyChat);
    }
    if state.repo_path.is_none() {
        return Decision::Run(StepKind::CloneRepo);
    }
    if !state.review_started {
        return Decision::Run(StepKind::MarkInProgress);
    }
    if state.findings.is_none() {
        return Decision::Run(StepKind::DeepReview);
    }
    if state.report.is_none() {
        return Decision::Run(StepKind::GenerateReport);
    }
    if !state.ticket_updated {
        return Decision::Run(StepKind::UpdateTicket);
    }
    if !state.chat_updated {
        return Decision::Run(StepKind::UpdateChat);
    }
    Decision::Halt(Halt::Success)
}

/// Upper bound on routed steps for a well-behaved run under `policy`.
///
/// Each re-ask cycle costs three steps (ask, parse, validate).
pub fn max_routed_steps(policy: &RoutePolicy) -> u32 {
    10 + 3 * policy.max_input_retries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ErrorInfo, ErrorKind, FileFindings, Report};

    fn policy() -> RoutePolicy {
        RoutePolicy::default()
    }

    fn validated() -> ReviewState {
        let mut state = ReviewState::new("review https://github.com/org/repo");
        state.repo_url = Some("https://github.com/org/repo".to_string());
        state.review_intent = Some("deep_review".to_string());
        state.is_valid_repo = Some(true);
        state
    }

    fn empty_report() -> Report {
        Report {
            overall_score: 0,
            critical_count: 0,
            high_count: 0,
            files_reviewed: 0,
            files: Vec::new(),
        }
    }

    #[test]
    fn fresh_state_routes_to_parse() {
        let state = ReviewState::new("hello");
        assert_eq!(route(&state, &policy()), Decision::Run(StepKind::Parse));
    }

    #[test]
    fn intent_without_url_routes_to_validate() {
        let mut state = ReviewState::new("hello");
        state.review_intent = Some("deep_review".to_string());
        assert_eq!(route(&state, &policy()), Decision::Run(StepKind::Validate));
    }

    #[test]
    fn error_halts_before_anything_else() {
        let mut state = ReviewState::new("hello");
        state.error = Some(ErrorInfo {
            step: Some(StepKind::CreateTicket),
            kind: ErrorKind::Collaborator,
            reason: "tracker down".to_string(),
            state_unchanged: true,
        });
        assert_eq!(
            route(&state, &policy()),
            Decision::Halt(Halt::Failure {
                reason: "tracker down".to_string()
            })
        );
    }

    #[test]
    fn invalid_repo_asks_until_retries_exhausted() {
        let mut state = validated();
        state.is_valid_repo = Some(false);
        let policy = RoutePolicy {
            max_input_retries: 2,
        };

        state.ask_repeat_count = 1;
        assert_eq!(route(&state, &policy), Decision::Run(StepKind::AskForInput));

        state.ask_repeat_count = 2;
        assert_eq!(
            route(&state, &policy),
            Decision::Halt(Halt::Failure {
                reason: TOO_MANY_INVALID_INPUTS.to_string()
            })
        );
    }

    #[test]
    fn zero_retries_halts_immediately_on_invalid_repo() {
        let mut state = validated();
        state.is_valid_repo = Some(false);
        let decision = route(
            &state,
            &RoutePolicy {
                max_input_retries: 0,
            },
        );
        assert!(matches!(decision, Decision::Halt(Halt::Failure { .. })));
    }

    #[test]
    fn table_walks_pipeline_in_order() {
        let mut state = validated();
        let mut seen = Vec::new();
        loop {
            let decision = route(&state, &policy());
            let Decision::Run(step) = decision else {
                assert_eq!(decision, Decision::Halt(Halt::Success));
                break;
            };
            seen.push(step);
            match step {
                StepKind::CreateTicket => state.ticket_id = Some("REV-1".to_string()),
                StepKind::NotifyChat => state.chat_thread_id = Some("t-1".to_string()),
                StepKind::CloneRepo => {
                    state.repo_path = Some("/tmp/r".to_string());
                    state.files_to_review = Some(vec!["a.py".to_string()]);
                }
                StepKind::MarkInProgress => state.review_started = true,
                StepKind::DeepReview => {
                    state.findings = Some(vec![FileFindings::degraded("a.py")]);
                }
                StepKind::GenerateReport => state.report = Some(empty_report()),
                StepKind::UpdateTicket => state.ticket_updated = true,
                StepKind::UpdateChat => state.chat_updated = true,
                other => panic!("unexpected step {other}"),
            }
        }
        assert_eq!(
            seen,
            vec![
                StepKind::CreateTicket,
                StepKind::NotifyChat,
                StepKind::CloneRepo,
                StepKind::MarkInProgress,
                StepKind::DeepReview,
                StepKind::GenerateReport,
                StepKind::UpdateTicket,
                StepKind::UpdateChat,
            ]
        );
    }

    #[test]
    fn routing_is_pure() {
        let mut state = validated();
        state.ticket_id = Some("REV-9".to_string());
        let first = route(&state, &policy());
        let snapshot = state.clone();
        for _ in 0..5 {
            assert_eq!(route(&state, &policy()), first);
        }
        assert_eq!(state, snapshot);
    }

    #[test]
    fn routed_step_bound_covers_retry_cycles() {
        assert_eq!(max_routed_steps(&RoutePolicy::default()), 19);
    }
}
