//! Version-control seam and the `git`-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::core::selector::{is_eligible, prioritize_files};
use crate::io::git::Git;

/// Operations the workflow needs from version control.
pub trait Vcs: Send + Sync {
    /// Clone `url` into a fresh location and return its path.
    fn clone_repo(&self, url: &str) -> Result<PathBuf>;

    /// Eligible source files under `path`, repository-relative, at most `max`.
    fn list_source_files(&self, path: &Path, max: usize) -> Result<Vec<String>>;
}

/// Clones with `git` into unique directories below `clone_root`.
#[derive(Debug, Clone)]
pub struct GitVcs {
    clone_root: PathBuf,
    extensions: Vec<String>,
    skip_dirs: Vec<String>,
}

impl GitVcs {
    pub fn new(clone_root: impl Into<PathBuf>, extensions: Vec<String>, skip_dirs: Vec<String>) -> Self {
        Self {
            clone_root: clone_root.into(),
            extensions,
            skip_dirs,
        }
    }
}

impl Vcs for GitVcs {
    #[instrument(skip_all, fields(url = %url))]
    fn clone_repo(&self, url: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.clone_root)
            .with_context(|| format!("create {}", self.clone_root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix("review-")
            .tempdir_in(&self.clone_root)
            .with_context(|| format!("create clone dir in {}", self.clone_root.display()))?;
        let dest = dir.path().join("repo");

        // Dropping `dir` on an early return removes the partial clone.
        Git::new(dir.path()).clone_shallow(url, &dest)?;
        match Git::new(&dest).head_short_sha(12) {
            Ok(sha) => info!(sha = %sha, "repository cloned"),
            Err(err) => warn!(err = %err, "cloned repository has no readable HEAD"),
        }

        let kept = dir.keep();
        Ok(kept.join("repo"))
    }

    #[instrument(skip(self))]
    fn list_source_files(&self, path: &Path, max: usize) -> Result<Vec<String>> {
        let skip_dirs = &self.skip_dirs;
        let walker = WalkDir::new(path).follow_links(false).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !skip_dirs
                    .iter()
                    .any(|skip| entry.file_name() == skip.as_str())
        });

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| format!("walk {}", path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(path)
                .with_context(|| format!("relativize {}", entry.path().display()))?;
            if !is_eligible(relative, &self.extensions, &self.skip_dirs) {
                continue;
            }
            let components: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            candidates.push(components.join("/"));
        }
        debug!(candidates = candidates.len(), "source files discovered");
        Ok(prioritize_files(candidates, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vcs(root: &Path) -> GitVcs {
        GitVcs::new(
            root.join("clones"),
            vec!["py".to_string(), "rs".to_string()],
            vec![".git".to_string(), "node_modules".to_string()],
        )
    }

    #[test]
    fn lists_files_by_depth_and_skips_vendor_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = temp.path().join("repo");
        for file in [
            "main.py",
            "lib/b.py",
            "lib/a.rs",
            "lib/deep/c.py",
            "node_modules/pkg/index.py",
            "README.md",
        ] {
            let path = repo.join(file);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(&path, "x\n").expect("write");
        }

        let files = vcs(temp.path()).list_source_files(&repo, 3).expect("list");
        assert_eq!(files, vec!["main.py", "lib/a.rs", "lib/b.py"]);
    }

    #[test]
    fn failed_clone_leaves_no_directory_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let vcs = vcs(temp.path());
        assert!(vcs.clone_repo("file:///definitely/missing/repo").is_err());
        let leftovers = fs::read_dir(temp.path().join("clones"))
            .expect("read clones")
            .count();
        assert_eq!(leftovers, 0);
    }
}
