//! The `deploy.yaml` target definition.

use serde::{Deserialize, Serialize};
use shipwright_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// File that marks a directory as a deployment target.
pub const DEFINITION_FILE: &str = "deploy.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDefinition {
    /// Command executed with `<shell> -c` inside the target directory.
    pub run: String,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Overrides the orchestrator's run timeout.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Repository name reported for scheduled runs. Derived from the
    /// directory name when absent.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub cron: String,
    /// Branches the schedule is armed on. Empty means any.
    #[serde(default)]
    pub branches: Vec<String>,
}

fn default_shell() -> String {
    "sh".to_string()
}

impl TargetDefinition {
    /// Parse and validate definition text read from `origin`.
    pub fn parse(origin: &Path, contents: &str) -> Result<Self> {
        let definition: Self =
            serde_yaml::from_str(contents).map_err(|e| Error::InvalidDefinition {
                path: origin.display().to_string(),
                message: e.to_string(),
            })?;

        if definition.run.trim().is_empty() {
            return Err(Error::InvalidDefinition {
                path: origin.display().to_string(),
                message: "`run` must not be empty".to_string(),
            });
        }

        Ok(definition)
    }

    /// Load the definition inside `dir`. `Ok(None)` if there is none.
    pub async fn load(dir: &Path) -> Result<Option<Self>> {
        let file = dir.join(DEFINITION_FILE);
        match tokio::fs::read_to_string(&file).await {
            Ok(contents) => Self::parse(&file, &contents).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True if a schedule exists and is armed on `branch`.
    pub fn schedules_branch(&self, branch: &str) -> bool {
        match &self.schedule {
            Some(schedule) => {
                schedule.branches.is_empty() || schedule.branches.iter().any(|b| b == branch)
            }
            None => false,
        }
    }
}
