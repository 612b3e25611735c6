//! Fixtures for push payloads and on-disk targets.

use serde_json::{Value, json};
use shipwright_targets::definition::DEFINITION_FILE;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Factory for push hook bodies.
pub struct PushFixture;

impl PushFixture {
    /// A push of `git_ref` to `repository`, trimmed to the fields that
    /// matter plus some realistic noise.
    pub fn body(repository: &str, git_ref: &str) -> Value {
        json!({
            "ref": git_ref,
            "before": "0000000000000000000000000000000000000000",
            "after": "a3f1c9d2e4b5a6978877665544332211ffeeddcc",
            "repository": {
                "name": repository,
                "full_name": format!("acme/{}", repository),
                "private": false
            },
            "pusher": { "name": "octocat", "email": "octocat@example.com" },
            "commits": []
        })
    }

    pub fn branch(repository: &str, branch: &str) -> Value {
        Self::body(repository, &format!("refs/heads/{}", branch))
    }

    pub fn tag(repository: &str, tag: &str) -> Value {
        Self::body(repository, &format!("refs/tags/{}", tag))
    }
}

/// A temporary targets root populated with `deploy.yaml` directories.
pub struct TargetsRoot {
    dir: TempDir,
}

impl TargetsRoot {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create `<root>/<name>/deploy.yaml` holding `definition`.
    pub fn add(&self, name: &str, definition: &str) -> anyhow::Result<PathBuf> {
        let target = self.dir.path().join(name);
        std::fs::create_dir_all(&target)?;
        std::fs::write(target.join(DEFINITION_FILE), definition)?;
        Ok(target)
    }

    /// A target whose run appends a line to `runs.log` in its directory.
    pub fn add_logging(&self, name: &str) -> anyhow::Result<PathBuf> {
        self.add(
            name,
            "run: echo \"$DEPLOY_NAME $DEPLOY_TRIGGER\" >> runs.log\n",
        )
    }

    /// Lines recorded by a target created with [`TargetsRoot::add_logging`].
    pub fn run_log(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join(name).join("runs.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
