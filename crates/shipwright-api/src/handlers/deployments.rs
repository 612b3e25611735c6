//! Operator-triggered deployments.
//!
//! Manual deploys go through the daemon's orchestrator so they share the
//! host-wide lock with hook and scheduled deployments.

use axum::{
    Json,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use shipwright_core::Error;
use shipwright_core::ports::SubmitOutcome;
use shipwright_orchestrator::TargetStatus;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use super::hooks::client_address;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployAccepted {
    pub name: String,
    pub outcome: SubmitOutcome,
    /// Completed counter before submission. A later
    /// [`shipwright_orchestrator::Completion`] with a higher sequence
    /// belongs to this request or a newer one.
    pub completed: u64,
}

pub async fn deploy(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<DeployAccepted>), (StatusCode, String)> {
    let source = client_address(&headers, peer, state.trust_forwarded_for);
    let request = state
        .admission
        .admit_manual(source, &name)
        .await
        .map_err(|e| {
            warn!(source = %source, name = %name, error = %e, "Manual deployment rejected");
            rejection(e)
        })?;

    let completed = state.orchestrator.target_status(&name).completed;
    let outcome = state.orchestrator.submit(request);
    info!(source = %source, name = %name, outcome = ?outcome, "Manual deployment submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DeployAccepted {
            name,
            outcome,
            completed,
        }),
    ))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<TargetStatus> {
    Json(state.orchestrator.target_status(&name))
}

fn rejection(error: Error) -> (StatusCode, String) {
    let status = match &error {
        Error::UntrustedSource(_) => StatusCode::FORBIDDEN,
        Error::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        Error::TargetNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}
