//! Deployment request types.
//!
//! A request names one unit of work. Its `name` is the only identity the
//! orchestrator uses for locking and queueing; two requests with the same
//! name address the same logical target.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const BRANCH_REF_PREFIX: &str = "refs/heads/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub name: String,
    pub path: PathBuf,
    pub repository: String,
    pub branch: String,
    pub trigger: Trigger,
    pub requested_at: DateTime<Utc>,
}

impl DeploymentRequest {
    /// Build a request for `repository` at `branch`, deriving its name.
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<PathBuf>,
        trigger: Trigger,
    ) -> Self {
        let repository = repository.into();
        let branch = branch.into();
        Self {
            name: target_name(&repository, &branch),
            path: path.into(),
            repository,
            branch,
            trigger,
            requested_at: Utc::now(),
        }
    }

    /// Build a request addressed to an existing target, keeping its name
    /// regardless of the branch its working copy is on.
    pub fn for_target(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        trigger: Trigger,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            repository: repository.into(),
            branch: branch.into(),
            trigger,
            requested_at: Utc::now(),
        }
    }
}

/// What caused a deployment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Push,
    Schedule,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Push => "push",
            Trigger::Schedule => "schedule",
            Trigger::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Extract the branch from a fully qualified ref.
///
/// `refs/heads/feature/x` yields `feature/x`. Tags and other non-branch refs
/// are rejected.
pub fn branch_from_ref(git_ref: &str) -> Result<&str> {
    match git_ref.strip_prefix(BRANCH_REF_PREFIX) {
        Some(branch) if !branch.is_empty() => Ok(branch),
        _ => Err(Error::UnsupportedRef(git_ref.to_string())),
    }
}

/// Normalize a branch for use inside a target name.
///
/// Path separators and whitespace become `-`, so `feature/x` maps to
/// `feature-x` and the name stays a single directory component.
pub fn branch_slug(branch: &str) -> String {
    branch
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect()
}

/// `{repository}-{branchSlug}`.
pub fn target_name(repository: &str, branch: &str) -> String {
    format!("{}-{}", repository, branch_slug(branch))
}
