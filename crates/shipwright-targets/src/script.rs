//! A target defined by a `deploy.yaml` file.

use crate::definition::TargetDefinition;
use crate::shell::{ShellCommand, ShellRunner};
use async_trait::async_trait;
use shipwright_core::ports::{RunReport, SourceControl, Target};
use shipwright_core::request::branch_slug;
use shipwright_core::{DeploymentRequest, Result, ScheduleSpec, Trigger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct ScriptTarget {
    name: String,
    path: PathBuf,
    definition: TargetDefinition,
    source_control: Arc<dyn SourceControl>,
    runner: ShellRunner,
}

impl ScriptTarget {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        definition: TargetDefinition,
        source_control: Arc<dyn SourceControl>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            definition,
            source_control,
            runner: ShellRunner::new(),
        }
    }

    pub fn definition(&self) -> &TargetDefinition {
        &self.definition
    }

    /// Repository reported for scheduled runs.
    fn repository(&self, branch: &str) -> String {
        if let Some(repository) = &self.definition.repository {
            return repository.clone();
        }
        let suffix = format!("-{}", branch_slug(branch));
        self.name
            .strip_suffix(&suffix)
            .unwrap_or(&self.name)
            .to_string()
    }
}

#[async_trait]
impl Target for ScriptTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn pull(&self, path: &Path) -> Result<()> {
        self.source_control.sync(path).await
    }

    async fn run(&self, request: &DeploymentRequest) -> Result<RunReport> {
        let mut env = self.definition.env.clone();
        env.insert("DEPLOY_NAME".to_string(), request.name.clone());
        env.insert("DEPLOY_REPOSITORY".to_string(), request.repository.clone());
        env.insert("DEPLOY_BRANCH".to_string(), request.branch.clone());
        env.insert("DEPLOY_TRIGGER".to_string(), request.trigger.to_string());

        self.runner
            .execute(ShellCommand {
                target: &self.name,
                shell: &self.definition.shell,
                command: &self.definition.run,
                workdir: &request.path,
                env,
            })
            .await
    }

    fn schedule(&self, branch: &str) -> Result<Option<ScheduleSpec>> {
        let Some(schedule) = &self.definition.schedule else {
            return Ok(None);
        };
        if !self.definition.schedules_branch(branch) {
            return Ok(None);
        }

        let request = DeploymentRequest::for_target(
            &self.name,
            &self.path,
            self.repository(branch),
            branch,
            Trigger::Schedule,
        );
        ScheduleSpec::new(&schedule.cron, request).map(Some)
    }

    fn run_timeout(&self) -> Option<Duration> {
        self.definition.timeout_seconds.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitSource;
    use std::collections::HashMap;

    fn definition(schedule: Option<(&str, Vec<&str>)>) -> TargetDefinition {
        TargetDefinition {
            run: "echo deployed > marker".to_string(),
            shell: "sh".to_string(),
            env: HashMap::new(),
            timeout_seconds: Some(60),
            repository: None,
            schedule: schedule.map(|(cron, branches)| crate::definition::ScheduleDefinition {
                cron: cron.to_string(),
                branches: branches.into_iter().map(String::from).collect(),
            }),
        }
    }

    fn target(dir: &Path, definition: TargetDefinition) -> ScriptTarget {
        ScriptTarget::new("app-main", dir, definition, Arc::new(GitSource::new()))
    }

    #[test]
    fn test_schedule_request_keeps_target_identity() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(dir.path(), definition(Some(("0 0 3 * * *", vec!["main"]))));

        let spec = target.schedule("main").unwrap().unwrap();
        assert_eq!(spec.request().name, "app-main");
        assert_eq!(spec.request().repository, "app");
        assert_eq!(spec.request().branch, "main");
        assert_eq!(spec.request().trigger, Trigger::Schedule);
        assert_eq!(spec.request().path, dir.path());
    }

    #[test]
    fn test_schedule_not_armed_on_other_branch() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(dir.path(), definition(Some(("0 0 3 * * *", vec!["main"]))));
        assert!(target.schedule("develop").unwrap().is_none());

        let unscheduled = ScriptTarget::new(
            "app-main",
            dir.path(),
            definition(None),
            Arc::new(GitSource::new()),
        );
        assert!(unscheduled.schedule("main").unwrap().is_none());
    }

    #[test]
    fn test_run_timeout_from_definition() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(dir.path(), definition(None));
        assert_eq!(target.run_timeout(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_run_executes_in_request_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(dir.path(), definition(None));
        let request = DeploymentRequest::new("app", "main", dir.path(), Trigger::Manual);

        let report = target.run(&request).await.unwrap();
        assert_eq!(report.exit_code, 0);
        assert!(dir.path().join("marker").exists());
    }
}
