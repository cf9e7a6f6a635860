//! Per-step snapshots under `<state_dir>/iterations/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::state::ReviewState;
use crate::core::types::{ErrorInfo, StepKind};

#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub run_id: String,
    pub iter: u32,
    pub step: StepKind,
    /// True when the step's state was adopted.
    pub ok: bool,
    pub error: Option<ErrorInfo>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub state_before_path: PathBuf,
    pub state_after_path: PathBuf,
}

impl IterationPaths {
    pub fn new(state_dir: &Path, run_id: &str, iter: u32) -> Self {
        let dir = state_dir
            .join("iterations")
            .join(run_id)
            .join(iter.to_string());
        Self {
            dir: dir.clone(),
            meta_path: dir.join("meta.json"),
            state_before_path: dir.join("state.before.json"),
            state_after_path: dir.join("state.after.json"),
        }
    }
}

pub struct IterationWriteRequest<'a> {
    pub state_dir: &'a Path,
    pub meta: &'a IterationMeta,
    pub state_before: &'a ReviewState,
    pub state_after: &'a ReviewState,
}

pub fn write_iteration(request: &IterationWriteRequest<'_>) -> Result<IterationPaths> {
    let paths = IterationPaths::new(request.state_dir, &request.meta.run_id, request.meta.iter);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create iteration dir {}", paths.dir.display()))?;

    write_json(&paths.meta_path, request.meta)?;
    write_json(&paths.state_before_path, request.state_before)?;
    write_json(&paths.state_after_path, request.state_after)?;

    Ok(paths)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
