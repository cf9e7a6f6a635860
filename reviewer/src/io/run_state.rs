//! Persistence for the workflow state (`.reviewer/state.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::state::ReviewState;

/// Load a persisted state from disk.
pub fn load_state(path: &Path) -> Result<ReviewState> {
    debug!(path = %path.display(), "loading state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let state: ReviewState = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    debug!(ticket_id = ?state.ticket_id, progress = ?state.progress(), "state loaded");
    Ok(state)
}

/// Atomically write state to disk (temp file + rename).
pub fn write_state(path: &Path, state: &ReviewState) -> Result<()> {
    debug!(path = %path.display(), ticket_id = ?state.ticket_id, "writing state");
    let mut buf = serde_json::to_string_pretty(state).context("serialize state")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
