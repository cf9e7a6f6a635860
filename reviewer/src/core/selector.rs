//! Deterministic selection of the source files to review.

use std::path::{Component, Path};

/// Order candidate files by path depth, then lexically, and keep at most `max`.
///
/// Paths are repository-relative with `/` separators.
pub fn prioritize_files(mut candidates: Vec<String>, max: usize) -> Vec<String> {
    candidates.sort_by(|a, b| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));
    candidates.dedup();
    candidates.truncate(max);
    candidates
}

/// True if `relative` has one of `extensions` and no component in `skip_dirs`.
pub fn is_eligible(relative: &Path, extensions: &[String], skip_dirs: &[String]) -> bool {
    let in_skipped_dir = relative.components().any(|component| match component {
        Component::Normal(name) => skip_dirs.iter().any(|skip| name == skip.as_str()),
        _ => false,
    });
    if in_skipped_dir {
        return false;
    }
    relative
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}
