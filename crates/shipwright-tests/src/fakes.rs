//! In-memory targets, registry and source control.

use async_trait::async_trait;
use shipwright_core::ports::{RunReport, SourceControl, Target, TargetRegistry};
use shipwright_core::{DeploymentRequest, Error, Result, ScheduleSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Root that fake targets pretend to live under.
pub const FAKE_ROOT: &str = "/srv/targets";

/// Shared record of what fake targets did.
#[derive(Debug, Default)]
pub struct Recorder {
    pulls: Mutex<Vec<String>>,
    runs: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pulls(&self) -> Vec<String> {
        lock(&self.pulls).clone()
    }

    /// Names of completed runs, in completion order.
    pub fn runs(&self) -> Vec<String> {
        lock(&self.runs).clone()
    }

    pub fn run_count(&self, name: &str) -> usize {
        lock(&self.runs).iter().filter(|n| *n == name).count()
    }

    /// Highest number of deployments observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a fake target behaves.
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    pub fail_pull: bool,
    pub fail_run: bool,
    pub pull_delay: Duration,
    pub run_delay: Duration,
    pub cron: Option<String>,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            fail_pull: false,
            fail_run: false,
            pull_delay: Duration::ZERO,
            run_delay: Duration::from_millis(10),
            cron: None,
        }
    }
}

impl FakeBehavior {
    pub fn running_for(millis: u64) -> Self {
        Self {
            run_delay: Duration::from_millis(millis),
            ..Default::default()
        }
    }

    pub fn failing_pull() -> Self {
        Self {
            fail_pull: true,
            ..Default::default()
        }
    }

    pub fn failing_run() -> Self {
        Self {
            fail_run: true,
            ..Default::default()
        }
    }

    pub fn scheduled(cron: &str) -> Self {
        Self {
            cron: Some(cron.to_string()),
            ..Default::default()
        }
    }
}

pub struct FakeTarget {
    name: String,
    path: PathBuf,
    behavior: FakeBehavior,
    recorder: Arc<Recorder>,
}

impl FakeTarget {
    pub fn new(name: &str, behavior: FakeBehavior, recorder: Arc<Recorder>) -> Self {
        Self {
            name: name.to_string(),
            path: Path::new(FAKE_ROOT).join(name),
            behavior,
            recorder,
        }
    }
}

#[async_trait]
impl Target for FakeTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn pull(&self, _path: &Path) -> Result<()> {
        tokio::time::sleep(self.behavior.pull_delay).await;
        lock(&self.recorder.pulls).push(self.name.clone());
        if self.behavior.fail_pull {
            return Err(Error::PullFailed {
                target: self.name.clone(),
                message: "fatal: could not read from remote repository".to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, request: &DeploymentRequest) -> Result<RunReport> {
        self.recorder.enter();
        tokio::time::sleep(self.behavior.run_delay).await;
        self.recorder.exit();
        lock(&self.recorder.runs).push(request.name.clone());

        if self.behavior.fail_run {
            return Err(Error::RunFailed {
                target: self.name.clone(),
                message: "exit code 1".to_string(),
            });
        }
        Ok(RunReport {
            exit_code: 0,
            duration_ms: self.behavior.run_delay.as_millis() as u64,
        })
    }

    fn schedule(&self, branch: &str) -> Result<Option<ScheduleSpec>> {
        let Some(cron) = &self.behavior.cron else {
            return Ok(None);
        };
        let request = DeploymentRequest::for_target(
            &self.name,
            &self.path,
            &self.name,
            branch,
            shipwright_core::Trigger::Schedule,
        );
        ScheduleSpec::new(cron, request).map(Some)
    }
}

/// Registry over a fixed set of fake targets, keyed by name.
#[derive(Default)]
pub struct FakeRegistry {
    targets: Mutex<HashMap<String, Arc<FakeTarget>>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(specs: &[(&str, FakeBehavior)], recorder: &Arc<Recorder>) -> Self {
        let registry = Self::new();
        for (name, behavior) in specs {
            registry.insert(FakeTarget::new(name, behavior.clone(), Arc::clone(recorder)));
        }
        registry
    }

    pub fn insert(&self, target: FakeTarget) {
        lock(&self.targets).insert(target.name.clone(), Arc::new(target));
    }

    /// Forget a target, as if its directory were deleted.
    pub fn remove(&self, name: &str) {
        lock(&self.targets).remove(name);
    }
}

#[async_trait]
impl TargetRegistry for FakeRegistry {
    fn locate(&self, name: &str) -> PathBuf {
        Path::new(FAKE_ROOT).join(name)
    }

    async fn discover(&self) -> Result<Vec<Arc<dyn Target>>> {
        let mut targets: Vec<Arc<dyn Target>> = lock(&self.targets)
            .values()
            .map(|t| Arc::clone(t) as Arc<dyn Target>)
            .collect();
        targets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(targets)
    }

    async fn resolve(&self, request: &DeploymentRequest) -> Result<Option<Arc<dyn Target>>> {
        Ok(lock(&self.targets)
            .get(&request.name)
            .map(|t| Arc::clone(t) as Arc<dyn Target>))
    }
}

/// Source control that reports a fixed branch and records syncs.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    branch: Option<String>,
    syncs: Mutex<Vec<PathBuf>>,
}

impl FakeSourceControl {
    pub fn on_branch(branch: &str) -> Self {
        Self {
            branch: Some(branch.to_string()),
            syncs: Mutex::default(),
        }
    }

    /// Every branch query fails.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn syncs(&self) -> Vec<PathBuf> {
        lock(&self.syncs).clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn current_branch(&self, path: &Path) -> Result<String> {
        self.branch
            .clone()
            .ok_or_else(|| Error::Internal(format!("{} is not on a branch", path.display())))
    }

    async fn sync(&self, path: &Path) -> Result<()> {
        lock(&self.syncs).push(path.to_path_buf());
        Ok(())
    }
}
