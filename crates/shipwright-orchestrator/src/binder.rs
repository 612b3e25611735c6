//! Binds target schedules to cron timers at startup.

use chrono::Utc;
use shipwright_core::ports::{DeploymentSink, SourceControl, TargetRegistry};
use shipwright_core::{Result, ScheduleSpec};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// An armed schedule. Dropping it leaves the timer running; call
/// [`BoundSchedule::abort`] to disarm.
#[derive(Debug)]
pub struct BoundSchedule {
    pub name: String,
    pub branch: String,
    pub expression: String,
    handle: JoinHandle<()>,
}

impl BoundSchedule {
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Arms a timer for every discovered target that exposes a schedule.
pub struct ScheduleBinder {
    registry: Arc<dyn TargetRegistry>,
    source_control: Arc<dyn SourceControl>,
    sink: Arc<dyn DeploymentSink>,
}

impl ScheduleBinder {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        source_control: Arc<dyn SourceControl>,
        sink: Arc<dyn DeploymentSink>,
    ) -> Self {
        Self {
            registry,
            source_control,
            sink,
        }
    }

    /// Discover targets once and arm their schedules.
    ///
    /// A target whose branch cannot be determined, or whose schedule is
    /// invalid, is skipped. Targets are never re-validated after binding.
    pub async fn bind(&self) -> Result<Vec<BoundSchedule>> {
        let targets = self.registry.discover().await?;
        let mut bound = Vec::new();

        for target in targets {
            let branch = match self.source_control.current_branch(target.path()).await {
                Ok(branch) => branch,
                Err(e) => {
                    warn!(name = %target.name(), error = %e, "Could not determine branch, schedule skipped");
                    continue;
                }
            };

            let spec = match target.schedule(&branch) {
                Ok(Some(spec)) => spec,
                Ok(None) => {
                    debug!(name = %target.name(), branch = %branch, "No schedule");
                    continue;
                }
                Err(e) => {
                    warn!(name = %target.name(), error = %e, "Invalid schedule, skipped");
                    continue;
                }
            };

            info!(
                name = %target.name(),
                branch = %branch,
                cron = %spec.expression(),
                "Schedule armed"
            );

            bound.push(BoundSchedule {
                name: target.name().to_string(),
                branch,
                expression: spec.expression().to_string(),
                handle: tokio::spawn(fire_loop(spec, Arc::clone(&self.sink))),
            });
        }

        Ok(bound)
    }
}

async fn fire_loop(spec: ScheduleSpec, sink: Arc<dyn DeploymentSink>) {
    loop {
        let now = Utc::now();
        let Some(next) = spec.next_after(now) else {
            info!(name = %spec.request().name, "Schedule has no further occurrences");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        let mut request = spec.request().clone();
        request.requested_at = Utc::now();
        let name = request.name.clone();
        let outcome = sink.submit(request);
        info!(name = %name, outcome = ?outcome, "Scheduled deployment fired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shipwright_core::ports::{RunReport, SubmitOutcome, Target};
    use shipwright_core::{DeploymentRequest, Error, Trigger};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    struct CronTarget {
        name: String,
        path: PathBuf,
        cron: Option<&'static str>,
    }

    #[async_trait]
    impl Target for CronTarget {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> &Path {
            &self.path
        }

        async fn pull(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn run(&self, _request: &DeploymentRequest) -> Result<RunReport> {
            Ok(RunReport {
                exit_code: 0,
                duration_ms: 0,
            })
        }

        fn schedule(&self, branch: &str) -> Result<Option<ScheduleSpec>> {
            let Some(cron) = self.cron else {
                return Ok(None);
            };
            let request = DeploymentRequest::for_target(
                &self.name,
                &self.path,
                "app",
                branch,
                Trigger::Schedule,
            );
            ScheduleSpec::new(cron, request).map(Some)
        }
    }

    struct Registry(Vec<Arc<dyn Target>>);

    #[async_trait]
    impl TargetRegistry for Registry {
        fn locate(&self, name: &str) -> PathBuf {
            PathBuf::from(name)
        }

        async fn discover(&self) -> Result<Vec<Arc<dyn Target>>> {
            Ok(self.0.clone())
        }

        async fn resolve(&self, _request: &DeploymentRequest) -> Result<Option<Arc<dyn Target>>> {
            Ok(None)
        }
    }

    /// Reports `main` everywhere except paths containing "detached".
    struct Git;

    #[async_trait]
    impl SourceControl for Git {
        async fn current_branch(&self, path: &Path) -> Result<String> {
            if path.to_string_lossy().contains("detached") {
                return Err(Error::Internal("not on a branch".to_string()));
            }
            Ok("main".to_string())
        }

        async fn sync(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<DeploymentRequest>>);

    impl DeploymentSink for RecordingSink {
        fn submit(&self, request: DeploymentRequest) -> SubmitOutcome {
            self.0.lock().unwrap().push(request);
            SubmitOutcome::Started
        }
    }

    fn target(name: &str, cron: Option<&'static str>) -> Arc<dyn Target> {
        Arc::new(CronTarget {
            name: name.to_string(),
            path: PathBuf::from(format!("/srv/{}", name)),
            cron,
        })
    }

    #[tokio::test]
    async fn test_bind_skips_unscheduled_and_branchless_targets() {
        let registry = Registry(vec![
            target("nightly", Some("0 0 3 * * *")),
            target("manual", None),
            target("detached", Some("0 0 3 * * *")),
            target("broken", Some("not a cron")),
        ]);
        let binder = ScheduleBinder::new(
            Arc::new(registry),
            Arc::new(Git),
            Arc::new(RecordingSink::default()),
        );

        let bound = binder.bind().await.unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "nightly");
        assert_eq!(bound[0].branch, "main");
        assert_eq!(bound[0].expression, "0 0 3 * * *");
        bound[0].abort();
    }

    #[tokio::test]
    async fn test_schedule_fire_submits_request() {
        let sink = Arc::new(RecordingSink::default());
        let registry = Registry(vec![target("every-second", Some("* * * * * *"))]);
        let binder = ScheduleBinder::new(
            Arc::new(registry),
            Arc::new(Git),
            Arc::clone(&sink) as Arc<dyn DeploymentSink>,
        );

        let bound = binder.bind().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_200)).await;
        bound[0].abort();

        let fired = sink.0.lock().unwrap().clone();
        assert!(!fired.is_empty());
        assert_eq!(fired[0].name, "every-second");
        assert_eq!(fired[0].branch, "main");
        assert_eq!(fired[0].trigger, Trigger::Schedule);
    }
}
