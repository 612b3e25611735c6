//! Test helper functions and utilities.

use shipwright_api::AppState;
use shipwright_orchestrator::DeploymentEvent;
use reqwest::Client;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Start a hook server for testing and return its address.
pub async fn start_test_server(
    state: Arc<AppState>,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        shipwright_api::serve(listener, state).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    Ok((addr, handle))
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// Hook API test client with base URL.
pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    /// POST a push event body to the hook endpoint.
    pub async fn push(&self, body: &Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url("/hooks/push"))
            .header("X-GitHub-Event", "push")
            .json(body)
            .send()
            .await
    }

    pub async fn post_raw(
        &self,
        path: &str,
        body: impl Into<reqwest::Body>,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.post(self.url(path)).body(body).send().await
    }

    /// Request a manual deployment of `name`.
    pub async fn deploy(&self, name: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url(&format!("/deployments/{}", name)))
            .send()
            .await
    }

    /// Fetch the orchestrator snapshot.
    pub async fn status(&self) -> anyhow::Result<Value> {
        let resp = self.get("/status").await?;
        Ok(resp.json().await?)
    }

    /// Check health endpoint.
    pub async fn health(&self) -> anyhow::Result<bool> {
        let resp = self.get("/health").await?;
        Ok(resp.status().is_success())
    }
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Collect events until the orchestrator reports idle.
///
/// Panics if idle is not reached within `timeout`.
pub async fn collect_until_idle(
    events: &mut broadcast::Receiver<DeploymentEvent>,
    timeout: Duration,
) -> Vec<DeploymentEvent> {
    assert_completes_within(
        async {
            let mut seen = Vec::new();
            loop {
                match events.recv().await {
                    Ok(DeploymentEvent::Idle) => return seen,
                    Ok(event) => seen.push(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return seen,
                }
            }
        },
        timeout,
    )
    .await
}

/// Names of every `Started` event, in order.
pub fn started_names(events: &[DeploymentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            DeploymentEvent::Started { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Assert that a future completes within a timeout.
pub async fn assert_completes_within<F, T>(future: F, timeout: Duration) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("Operation timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_immediate() {
        let result = wait_for(Duration::from_secs(1), Duration::from_millis(10), || async {
            true
        })
        .await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let result = wait_for(
            Duration::from_millis(100),
            Duration::from_millis(10),
            || async { false },
        )
        .await;
        assert!(!result);
    }

    #[test]
    fn test_started_names() {
        let events = vec![
            DeploymentEvent::Started {
                name: "a-main".into(),
                trigger: shipwright_core::Trigger::Push,
            },
            DeploymentEvent::Idle,
        ];
        assert_eq!(started_names(&events), vec!["a-main"]);
    }
}
