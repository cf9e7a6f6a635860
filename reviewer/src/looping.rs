//! Executor drive loop: route, run the chosen step, repeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::core::budget::{ITERATION_BUDGET_EXCEEDED, IterationBudget};
use crate::core::invariants::check_transition;
use crate::core::router::{Decision, Halt, route};
use crate::core::state::ReviewState;
use crate::core::types::{ErrorInfo, ErrorKind, StepKind};
use crate::io::config::ReviewConfig;
use crate::io::input::InputRequest;
use crate::step::{Collaborators, StepError, StepOutput, discard_rejected, execute_step};

/// Cooperative cancellation flag, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every step completed.
    Success,
    /// The run halted on a fatal error, also recorded in `state.error`.
    Failed(ErrorInfo),
    /// Cancellation was requested before the next step.
    Cancelled,
    /// Corrected input is needed; resume the persisted state once it exists.
    AwaitingInput(InputRequest),
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub state: ReviewState,
    pub steps_executed: u32,
    pub stop: LoopStop,
}

/// One executed step, handed to the `on_step` hook.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// 1-based position of the step in this invocation.
    pub iter: u32,
    pub step: StepKind,
    pub before: ReviewState,
    pub after: ReviewState,
    /// Set when the step failed or broke a transition rule.
    pub error: Option<ErrorInfo>,
    pub duration: Duration,
}

/// Drive `state` until the router halts, the run is cancelled, input is
/// needed, or the iteration ceiling is reached.
///
/// Step failures are not returned as errors: they are recorded in
/// `state.error`, after which the router halts the run.
#[instrument(skip_all, fields(ticket_id = ?state.ticket_id))]
pub fn run_loop<F: FnMut(&StepRecord)>(
    mut state: ReviewState,
    collab: &Collaborators<'_>,
    config: &ReviewConfig,
    cancel: &CancelToken,
    mut on_step: F,
) -> LoopOutcome {
    let policy = config.route_policy();
    let mut budget = IterationBudget::new(config.max_iterations);
    let mut steps_executed = 0u32;

    loop {
        if cancel.is_cancelled() {
            info!(steps_executed, "run cancelled");
            return finish(state, steps_executed, LoopStop::Cancelled);
        }

        let step = match route(&state, &policy) {
            Decision::Run(step) => step,
            Decision::Halt(Halt::Success) => {
                info!(steps_executed, "run complete");
                return finish(state, steps_executed, LoopStop::Success);
            }
            Decision::Halt(Halt::Failure { reason }) => {
                let info = record_halt(&mut state, reason);
                warn!(kind = %info.kind, reason = %info.reason, "run failed");
                return finish(state, steps_executed, LoopStop::Failed(info));
            }
        };

        if !budget.try_claim() {
            let info = record_halt(&mut state, ITERATION_BUDGET_EXCEEDED.to_string());
            warn!(max_iterations = config.max_iterations, "iteration budget exceeded");
            return finish(state, steps_executed, LoopStop::Failed(info));
        }

        debug!(step = %step, iter = budget.used(), "running step");
        let started = Instant::now();
        let before = state.clone();
        let error = match execute_step(step, &state, collab, config) {
            Ok(StepOutput::Advanced(next)) => {
                let violations = check_transition(&state, &next, step, config.max_files);
                if violations.is_empty() {
                    state = next;
                    None
                } else {
                    discard_rejected(step, &state, &next);
                    Some(StepError::invariant(step, violations.join("; ")))
                }
            }
            Ok(StepOutput::Suspended(request)) => {
                info!(attempt = request.attempt, "run suspended awaiting input");
                return finish(state, steps_executed, LoopStop::AwaitingInput(request));
            }
            Err(err) => Some(err),
        };
        let error = error.map(|err| {
            warn!(step = %step, kind = %err.kind, err = %err, "step failed");
            let info = err.to_error_info();
            state.error = Some(info.clone());
            info
        });

        steps_executed += 1;
        on_step(&StepRecord {
            iter: steps_executed,
            step,
            before,
            after: state.clone(),
            error,
            duration: started.elapsed(),
        });
    }
}

fn record_halt(state: &mut ReviewState, reason: String) -> ErrorInfo {
    if let Some(existing) = &state.error {
        return existing.clone();
    }
    let info = ErrorInfo {
        step: None,
        kind: ErrorKind::BudgetExceeded,
        reason,
        state_unchanged: true,
    };
    state.error = Some(info.clone());
    info
}

fn finish(state: ReviewState, steps_executed: u32, stop: LoopStop) -> LoopOutcome {
    LoopOutcome {
        state,
        steps_executed,
        stop,
    }
}
