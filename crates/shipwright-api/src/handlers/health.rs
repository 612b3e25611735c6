//! Liveness check.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// A deployment currently holds the lock.
    pub busy: bool,
    pub trusted_ranges: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        busy: state.orchestrator.is_busy(),
        trusted_ranges: state.admission.allow_list().ranges().len(),
    })
}
