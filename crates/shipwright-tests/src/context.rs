//! Test context wiring fakes, the orchestrator and a live hook server.

use crate::fakes::{FakeBehavior, FakeRegistry, FakeSourceControl, Recorder};
use crate::helpers::{ApiTestClient, start_test_server};
use shipwright_api::{AdmissionFilter, AllowList, AppState};
use shipwright_orchestrator::{Orchestrator, OrchestratorConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything needed to drive deployments over HTTP.
///
/// Loopback is on the allow-list. Drop this to stop the server.
pub struct TestContext {
    pub recorder: Arc<Recorder>,
    pub registry: Arc<FakeRegistry>,
    /// Working copies all report `main`.
    pub source_control: Arc<FakeSourceControl>,
    pub orchestrator: Orchestrator,
    pub allow_list: AllowList,
    pub addr: SocketAddr,
    pub client: ApiTestClient,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a server over fake targets named in `targets`.
    pub async fn new(targets: &[(&str, FakeBehavior)]) -> anyhow::Result<Self> {
        Self::with_allow_list(targets, &["127.0.0.0/8"]).await
    }

    pub async fn with_allow_list(
        targets: &[(&str, FakeBehavior)],
        ranges: &[&str],
    ) -> anyhow::Result<Self> {
        crate::init_test_logging();

        let recorder = Recorder::new();
        let registry = Arc::new(FakeRegistry::with_targets(targets, &recorder));
        let orchestrator = Orchestrator::new(registry.clone(), OrchestratorConfig::default());
        let allow_list = AllowList::parse(ranges.iter().copied())?;

        let source_control = Arc::new(FakeSourceControl::on_branch("main"));

        let admission =
            AdmissionFilter::new(allow_list.clone(), registry.clone(), source_control.clone());
        let state = Arc::new(AppState::new(admission, orchestrator.clone()));
        let (addr, server) = start_test_server(state).await?;

        Ok(Self {
            recorder,
            registry,
            source_control,
            orchestrator,
            allow_list,
            addr,
            client: ApiTestClient::new(addr),
            server,
        })
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}
