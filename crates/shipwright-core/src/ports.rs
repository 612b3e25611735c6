//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the orchestration core and the
//! adapters that touch disk, processes and the network.

use crate::schedule::ScheduleSpec;
use crate::{DeploymentRequest, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A deployable unit with its own pull, run and schedule logic.
#[async_trait]
pub trait Target: Send + Sync {
    /// Target name, equal to the name of the requests it serves.
    fn name(&self) -> &str;

    /// Working copy location.
    fn path(&self) -> &Path;

    /// Synchronize the working copy at `path` with the latest source.
    async fn pull(&self, path: &Path) -> Result<()>;

    /// Execute the deployment.
    async fn run(&self, request: &DeploymentRequest) -> Result<RunReport>;

    /// Schedule for the working copy currently on `branch`, if any.
    fn schedule(&self, _branch: &str) -> Result<Option<ScheduleSpec>> {
        Ok(None)
    }

    /// Per-target run timeout, overriding the orchestrator default.
    fn run_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Loader for deployment targets.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// Working copy location for a target name.
    fn locate(&self, name: &str) -> PathBuf;

    /// All targets currently defined.
    async fn discover(&self) -> Result<Vec<Arc<dyn Target>>>;

    /// Load the target serving `request`, reading its definition afresh.
    /// `Ok(None)` means no definition exists.
    async fn resolve(&self, request: &DeploymentRequest) -> Result<Option<Arc<dyn Target>>>;
}

/// Version-control operations against a working copy.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Name of the checked-out branch.
    async fn current_branch(&self, path: &Path) -> Result<String>;

    /// Discard local modifications, then fetch and merge upstream.
    async fn sync(&self, path: &Path) -> Result<()>;
}

/// Anything that accepts deployment requests.
pub trait DeploymentSink: Send + Sync {
    /// Hand over a request. Never blocks on the deployment itself.
    fn submit(&self, request: DeploymentRequest) -> SubmitOutcome;
}

/// What `submit` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Execution was kicked off.
    Started,
    /// Stored in the pending queue.
    Queued,
    /// Overwrote a queued request with the same name.
    Replaced,
}
