//! Run bootstrap: run ids, local adapters, and the persisting drive loop.
//!
//! A "run" is one invocation of the executor, identified by a `run_id`
//! allocated under `<state_dir>/runs/`. Its state lives in
//! `<state_dir>/runs/<run_id>/state.json` and each executed step leaves a
//! snapshot under `<state_dir>/iterations/<run_id>/<iter>/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::state::ReviewState;
use crate::io::chat::FileChat;
use crate::io::config::ReviewConfig;
use crate::io::input::InputSource;
use crate::io::iteration_log::{IterationMeta, IterationWriteRequest, write_iteration};
use crate::io::llm::CommandLlm;
use crate::io::outbox::allocate_dir;
use crate::io::run_state::write_state;
use crate::io::tracker::FileTracker;
use crate::io::vcs::GitVcs;
use crate::looping::{CancelToken, LoopOutcome, StepRecord, run_loop};
use crate::step::Collaborators;

/// Identity and state file of a newly allocated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
    pub state_path: PathBuf,
}

/// Allocate a fresh run id under `<state_dir>/runs/`.
///
/// Concurrent callers sharing a state dir always receive distinct ids.
pub fn allocate_run(state_dir: &Path) -> Result<RunHandle> {
    let (run_id, dir) = allocate_dir(&state_dir.join("runs"), "run")?;
    info!(run_id = %run_id, "allocated run");
    Ok(RunHandle {
        run_id,
        state_path: dir.join("state.json"),
    })
}

/// Production collaborators: command-backed LLM, git VCS and file outboxes.
pub struct LocalAdapters {
    pub llm: CommandLlm,
    pub tracker: FileTracker,
    pub chat: FileChat,
    pub vcs: GitVcs,
}

impl LocalAdapters {
    pub fn from_config(config: &ReviewConfig) -> Result<Self> {
        let clone_root = config
            .clone_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("reviewer-clones"));
        debug!(clone_root = %clone_root.display(), "local adapters");
        Ok(Self {
            llm: CommandLlm::new(&config.llm).context("configure llm command")?,
            tracker: FileTracker::new(config.state_dir.join("tracker"), config.statuses.clone()),
            chat: FileChat::new(config.state_dir.join("chat")),
            vcs: GitVcs::new(
                clone_root,
                config.source_extensions.clone(),
                config.skip_dirs.clone(),
            ),
        })
    }

    pub fn collaborators<'a>(&'a self, input: &'a dyn InputSource) -> Collaborators<'a> {
        Collaborators {
            parser: &self.llm,
            tracker: &self.tracker,
            chat: &self.chat,
            vcs: &self.vcs,
            analyzer: &self.llm,
            input,
        }
    }
}

/// Where a driven run writes its artifacts.
#[derive(Debug, Clone, Copy)]
pub struct DriveTarget<'a> {
    pub run_id: &'a str,
    pub state_path: &'a Path,
}

/// Run the executor loop, logging every step and persisting the final state.
///
/// The state is written even when the run fails, is cancelled, or suspends
/// for input, so it can be inspected or resumed.
pub fn drive(
    state: ReviewState,
    target: DriveTarget<'_>,
    collab: &Collaborators<'_>,
    config: &ReviewConfig,
    cancel: &CancelToken,
) -> Result<LoopOutcome> {
    let mut log_error: Option<anyhow::Error> = None;
    let outcome = run_loop(state, collab, config, cancel, |record: &StepRecord| {
        if log_error.is_some() {
            return;
        }
        if let Err(err) = log_step(&config.state_dir, target.run_id, record) {
            warn!(err = %err, iter = record.iter, "failed to write iteration log");
            log_error = Some(err);
        }
    });

    write_state(target.state_path, &outcome.state)
        .with_context(|| format!("persist state for {}", target.run_id))?;
    if let Some(err) = log_error {
        return Err(err).context("write iteration log");
    }
    Ok(outcome)
}

fn log_step(state_dir: &Path, run_id: &str, record: &StepRecord) -> Result<()> {
    let meta = IterationMeta {
        run_id: run_id.to_string(),
        iter: record.iter,
        step: record.step,
        ok: record.error.is_none(),
        error: record.error.clone(),
        duration_ms: record.duration.as_millis() as u64,
    };
    write_iteration(&IterationWriteRequest {
        state_dir,
        meta: &meta,
        state_before: &record.before,
        state_after: &record.after,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_sequential_and_unique() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = allocate_run(temp.path()).expect("first");
        let second = allocate_run(temp.path()).expect("second");
        assert_eq!(first.run_id, "run-1");
        assert_eq!(second.run_id, "run-2");
        assert!(first.state_path.ends_with("runs/run-1/state.json"));
    }

    #[test]
    fn local_adapters_live_under_state_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ReviewConfig {
            state_dir: temp.path().to_path_buf(),
            clone_root: Some(temp.path().join("clones")),
            ..ReviewConfig::default()
        };
        assert!(LocalAdapters::from_config(&config).is_ok());
    }
}
