//! Orchestrator status handler.

use axum::{Json, extract::State};
use shipwright_orchestrator::Snapshot;
use std::sync::Arc;

use crate::state::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.orchestrator.snapshot())
}
