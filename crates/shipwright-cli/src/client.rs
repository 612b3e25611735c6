//! HTTP client for a running daemon.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use shipwright_api::DeployAccepted;
use shipwright_orchestrator::TargetStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("server error: {0}")]
    Server(String),
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Ask the daemon to deploy `name`.
    pub async fn deploy(&self, name: &str) -> Result<DeployAccepted, ApiError> {
        let res = self
            .request(Method::POST, &format!("/deployments/{}", name))
            .send()
            .await?;

        match res.status() {
            StatusCode::ACCEPTED => Ok(res.json().await?),
            _ => Err(failure(res).await),
        }
    }

    pub async fn status(&self, name: &str) -> Result<TargetStatus, ApiError> {
        let res = self
            .request(Method::GET, &format!("/deployments/{}", name))
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => Ok(res.json().await?),
            _ => Err(failure(res).await),
        }
    }
}

async fn failure(res: Response) -> ApiError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body
    };
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN => ApiError::Rejected(message),
        _ => ApiError::Server(message),
    }
}
