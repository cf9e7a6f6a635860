//! Small wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Shallow-clone `url` into `dest` (which must be missing or empty).
    #[instrument(skip_all, fields(url = %url))]
    pub fn clone_shallow(&self, url: &str, dest: &Path) -> Result<()> {
        let dest_arg = dest.to_string_lossy();
        debug!(dest = %dest.display(), "cloning repository");
        self.run_checked(&["clone", "--depth", "1", "--", url, &dest_arg])?;
        Ok(())
    }

    /// Return the current HEAD short SHA.
    pub fn head_short_sha(&self, len: usize) -> Result<String> {
        let arg = format!("--short={len}");
        let out = self.run_capture(&["rev-parse", &arg, "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo(root: &Path) {
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "test"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(root)
                .status()
                .expect("git");
            assert!(status.success());
        }
        fs::write(root.join("main.py"), "print('hi')\n").expect("write");
        for args in [vec!["add", "main.py"], vec!["commit", "-q", "-m", "init"]] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(root)
                .status()
                .expect("git");
            assert!(status.success());
        }
    }

    #[test]
    fn clones_local_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let origin = temp.path().join("origin");
        fs::create_dir_all(&origin).expect("mkdir");
        init_repo(&origin);

        let dest = temp.path().join("clone");
        let url = format!("file://{}", origin.display());
        Git::new(temp.path())
            .clone_shallow(&url, &dest)
            .expect("clone");

        assert!(dest.join("main.py").is_file());
        let sha = Git::new(&dest).head_short_sha(8).expect("sha");
        assert_eq!(sha.len(), 8);
    }

    #[test]
    fn clone_failure_reports_git_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Git::new(temp.path())
            .clone_shallow("file:///definitely/missing/repo", &temp.path().join("x"))
            .unwrap_err();
        assert!(err.to_string().contains("git clone"));
    }
}
