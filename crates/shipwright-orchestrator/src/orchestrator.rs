//! The single-flight deployment orchestrator.

use crate::events::{DeploymentEvent, Stage};
use crate::state::{Admission, OrchestratorState, Outcome, Snapshot, TargetStatus};

use shipwright_core::ports::{DeploymentSink, RunReport, SubmitOutcome, Target, TargetRegistry};
use shipwright_core::{DeploymentRequest, Error, Result};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a pull. `None` waits forever.
    pub pull_timeout: Option<Duration>,
    /// Upper bound on a run unless the target sets its own.
    pub run_timeout: Option<Duration>,
    /// Buffered events per subscriber before lagging.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pull_timeout: Some(Duration::from_secs(300)),
            run_timeout: Some(Duration::from_secs(1800)),
            event_capacity: 256,
        }
    }
}

/// Runs at most one deployment at a time across the whole process.
///
/// Cloning is cheap and every clone shares the same lock and queue.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<dyn TargetRegistry>,
    config: OrchestratorConfig,
    state: Mutex<OrchestratorState>,
    events: broadcast::Sender<DeploymentEvent>,
}

impl Orchestrator {
    pub fn new(registry: Arc<dyn TargetRegistry>, config: OrchestratorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                registry,
                config,
                state: Mutex::new(OrchestratorState::new()),
                events,
            }),
        }
    }

    /// Submit a request. Returns as soon as it is started or queued.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: DeploymentRequest) -> SubmitOutcome {
        let name = request.name.clone();
        let admission = self.state().admit(request);

        match admission {
            Admission::Start(request) => {
                self.spawn(request);
                SubmitOutcome::Started
            }
            Admission::Queued => {
                info!(name = %name, "Deployment in progress, request queued");
                self.emit(DeploymentEvent::Queued {
                    name,
                    replaced: false,
                });
                SubmitOutcome::Queued
            }
            Admission::Replaced => {
                info!(name = %name, "Deployment in progress, replaced queued request");
                self.emit(DeploymentEvent::Queued {
                    name,
                    replaced: true,
                });
                SubmitOutcome::Replaced
            }
        }
    }

    /// Subscribe to lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot()
    }

    pub fn target_status(&self, name: &str) -> TargetStatus {
        self.state().target_status(name)
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_active()
    }

    fn state(&self) -> MutexGuard<'_, OrchestratorState> {
        // The state is consistent after every transition, so a poisoned
        // lock is still safe to use.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: DeploymentEvent) {
        let _ = self.inner.events.send(event);
    }

    fn spawn(&self, request: DeploymentRequest) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.execute(request).await;
        });
    }

    async fn execute(self, request: DeploymentRequest) {
        let mut release = ReleaseGuard {
            orchestrator: self.clone(),
            name: request.name.clone(),
            outcome: None,
        };

        info!(
            name = %request.name,
            trigger = %request.trigger,
            path = %request.path.display(),
            "Starting deployment"
        );
        self.emit(DeploymentEvent::Started {
            name: request.name.clone(),
            trigger: request.trigger,
        });

        match self.deploy(&request).await {
            Ok(report) => {
                info!(
                    name = %request.name,
                    exit_code = report.exit_code,
                    duration_ms = report.duration_ms,
                    "Deployment succeeded"
                );
                release.outcome = Some(Outcome::Succeeded);
                self.emit(DeploymentEvent::Succeeded {
                    name: request.name.clone(),
                    duration_ms: report.duration_ms,
                });
            }
            Err((stage, e)) => {
                error!(name = %request.name, stage = %stage, error = %e, "Deployment failed");
                let error = e.to_string();
                release.outcome = Some(Outcome::Failed {
                    stage,
                    error: error.clone(),
                });
                self.emit(DeploymentEvent::Failed {
                    name: request.name.clone(),
                    stage,
                    error,
                });
            }
        }
    }

    /// Pull, re-resolve, run. A failed pull never reaches `run`.
    async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> std::result::Result<RunReport, (Stage, Error)> {
        let target = self.resolve(request).await.map_err(|e| (Stage::Pull, e))?;

        debug!(name = %request.name, "Pulling latest source");
        with_timeout(
            "pull",
            self.inner.config.pull_timeout,
            target.pull(&request.path),
        )
        .await
        .map_err(|e| (Stage::Pull, e))?;

        // The pull may have changed the definition itself.
        let target = self.resolve(request).await.map_err(|e| (Stage::Run, e))?;
        let limit = target.run_timeout().or(self.inner.config.run_timeout);

        debug!(name = %request.name, "Running deployment");
        with_timeout("run", limit, target.run(request))
            .await
            .map_err(|e| (Stage::Run, e))
    }

    async fn resolve(&self, request: &DeploymentRequest) -> Result<Arc<dyn Target>> {
        self.inner
            .registry
            .resolve(request)
            .await?
            .ok_or_else(|| Error::TargetNotFound(request.name.clone()))
    }

    fn release(&self, name: &str, outcome: Outcome) {
        let next = self.state().complete(name, outcome);
        match next {
            Some(request) => {
                info!(finished = %name, next = %request.name, "Draining queued deployment");
                self.spawn(request);
            }
            None => {
                debug!(finished = %name, "Orchestrator idle");
                self.emit(DeploymentEvent::Idle);
            }
        }
    }
}

impl DeploymentSink for Orchestrator {
    fn submit(&self, request: DeploymentRequest) -> SubmitOutcome {
        Orchestrator::submit(self, request)
    }
}

/// Releases the lock and drains the queue when an execution ends, however
/// it ends.
struct ReleaseGuard {
    orchestrator: Orchestrator,
    name: String,
    outcome: Option<Outcome>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!(name = %self.name, "Deployment task panicked, releasing lock");
        }
        let outcome = self.outcome.take().unwrap_or_else(|| Outcome::Failed {
            stage: Stage::Run,
            error: "deployment task aborted".to_string(),
        });
        self.orchestrator.release(&self.name, outcome);
    }
}

async fn with_timeout<T>(
    operation: &str,
    limit: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
                limit,
            })?,
        None => future.await,
    }
}
