//! Application state shared across handlers.

use crate::admission::AdmissionFilter;
use shipwright_orchestrator::Orchestrator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: AdmissionFilter,
    pub orchestrator: Orchestrator,
    /// Take the client address from `X-Forwarded-For` when running behind
    /// a reverse proxy.
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(admission: AdmissionFilter, orchestrator: Orchestrator) -> Self {
        Self {
            admission,
            orchestrator,
            trust_forwarded_for: false,
        }
    }

    pub fn with_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}
