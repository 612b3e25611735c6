//! Git working-copy operations.

use async_trait::async_trait;
use shipwright_core::ports::SourceControl;
use shipwright_core::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Shells out to the `git` binary.
#[derive(Debug, Clone)]
pub struct GitSource {
    program: String,
}

impl Default for GitSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GitSource {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    async fn git(&self, path: &Path, args: &[&str]) -> std::result::Result<String, String> {
        debug!(path = %path.display(), args = ?args, "Running git");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to execute git {}: {}", args.join(" "), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl SourceControl for GitSource {
    async fn current_branch(&self, path: &Path) -> Result<String> {
        let branch = self
            .git(path, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .map_err(Error::Internal)?;

        if branch.is_empty() || branch == "HEAD" {
            return Err(Error::Internal(format!(
                "{} is not on a branch",
                path.display()
            )));
        }
        Ok(branch)
    }

    async fn sync(&self, path: &Path) -> Result<()> {
        let pull_failed = |message: String| Error::PullFailed {
            target: path.display().to_string(),
            message,
        };

        self.git(path, &["reset", "--hard"]).await.map_err(pull_failed)?;
        self.git(path, &["pull"]).await.map_err(pull_failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("vanished");

        let err = GitSource::new().sync(&missing).await.unwrap_err();
        assert!(matches!(err, Error::PullFailed { .. }));
    }

    #[tokio::test]
    async fn test_current_branch_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GitSource::new().current_branch(dir.path()).await.is_err());
    }
}
