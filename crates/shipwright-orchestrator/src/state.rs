//! Orchestrator state: the single-flight lock and the pending queue.
//!
//! All transitions happen under one mutex owned by the orchestrator. This
//! module is the state machine alone; it never spawns or awaits.

use crate::events::Stage;
use serde::{Deserialize, Serialize};
use shipwright_core::DeploymentRequest;
use std::collections::{HashMap, HashSet};

/// Result of admitting a request.
#[derive(Debug)]
pub enum Admission {
    /// The lock was free and is now held for this request.
    Start(DeploymentRequest),
    /// Busy; the request now occupies its name's pending slot.
    Queued,
    /// Busy; the request overwrote a queued request with the same name.
    Replaced,
}

#[derive(Debug, Default)]
pub struct OrchestratorState {
    active_lock: bool,
    active_names: HashSet<String>,
    pending: HashMap<String, DeploymentRequest>,
    completed: u64,
    last: HashMap<String, Completion>,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `request`, or queue it if any deployment runs.
    pub fn admit(&mut self, request: DeploymentRequest) -> Admission {
        if self.active_lock {
            return match self.pending.insert(request.name.clone(), request) {
                Some(_) => Admission::Replaced,
                None => Admission::Queued,
            };
        }

        self.active_lock = true;
        self.active_names.insert(request.name.clone());
        Admission::Start(request)
    }

    /// Release the lock held for `name`, recording how it ended.
    ///
    /// If anything is pending, one entry is taken and the lock is handed
    /// straight to it; the caller must start the returned request. With
    /// nothing pending the lock is left free.
    pub fn complete(&mut self, name: &str, outcome: Outcome) -> Option<DeploymentRequest> {
        self.active_names.remove(name);
        self.active_lock = false;
        self.completed += 1;
        self.last.insert(
            name.to_string(),
            Completion {
                sequence: self.completed,
                outcome,
            },
        );

        let next_name = self.pending.keys().next().cloned()?;
        let next = self.pending.remove(&next_name)?;
        match self.admit(next) {
            Admission::Start(request) => Some(request),
            // unreachable: the lock was cleared above
            Admission::Queued | Admission::Replaced => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_lock
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Where `name` stands. `completed` in the result is the global
    /// counter, comparable with [`Completion::sequence`].
    pub fn target_status(&self, name: &str) -> TargetStatus {
        TargetStatus {
            name: name.to_string(),
            running: self.active_names.contains(name),
            pending: self.pending.contains_key(name),
            completed: self.completed,
            last: self.last.get(name).cloned(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut pending: Vec<String> = self.pending.keys().cloned().collect();
        pending.sort();
        Snapshot {
            running: self.active_names.iter().next().cloned(),
            pending,
            completed: self.completed,
        }
    }
}

/// Point-in-time view of the orchestrator, served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub running: Option<String>,
    pub pending: Vec<String>,
    pub completed: u64,
}

/// How a finished deployment ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed { stage: Stage, error: String },
}

/// The most recent finish of one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Value of the global completed counter when this finish was recorded.
    pub sequence: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub name: String,
    pub running: bool,
    pub pending: bool,
    pub completed: u64,
    pub last: Option<Completion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_core::Trigger;

    fn request(repo: &str, branch: &str) -> DeploymentRequest {
        DeploymentRequest::new(repo, branch, format!("/srv/{}-{}", repo, branch), Trigger::Push)
    }

    #[test]
    fn test_first_request_starts() {
        let mut state = OrchestratorState::new();
        assert!(matches!(state.admit(request("app", "main")), Admission::Start(_)));
        assert!(state.is_active());
        assert_eq!(state.snapshot().running.as_deref(), Some("app-main"));
    }

    #[test]
    fn test_busy_requests_queue_per_name() {
        let mut state = OrchestratorState::new();
        state.admit(request("app", "main"));

        assert!(matches!(state.admit(request("api", "main")), Admission::Queued));
        assert!(matches!(state.admit(request("api", "main")), Admission::Replaced));
        assert!(matches!(state.admit(request("web", "dev")), Admission::Queued));
        assert_eq!(state.pending_len(), 2);
    }

    #[test]
    fn test_running_name_is_queued_not_skipped() {
        let mut state = OrchestratorState::new();
        state.admit(request("app", "main"));
        assert!(matches!(state.admit(request("app", "main")), Admission::Queued));
        assert_eq!(state.snapshot().pending, vec!["app-main".to_string()]);
    }

    #[test]
    fn test_complete_hands_lock_to_next() {
        let mut state = OrchestratorState::new();
        state.admit(request("app", "main"));
        state.admit(request("api", "main"));

        let next = state.complete("app-main", Outcome::Succeeded).unwrap();
        assert_eq!(next.name, "api-main");
        assert!(state.is_active());
        assert_eq!(state.pending_len(), 0);

        assert!(state.complete("api-main", Outcome::Succeeded).is_none());
        assert!(!state.is_active());
        assert_eq!(state.snapshot().completed, 2);
    }

    #[test]
    fn test_drain_is_exhaustive() {
        let mut state = OrchestratorState::new();
        state.admit(request("first", "main"));
        for repo in ["a", "b", "c", "d"] {
            state.admit(request(repo, "main"));
        }

        let mut current = "first-main".to_string();
        let mut drained = Vec::new();
        while let Some(next) = state.complete(&current, Outcome::Succeeded) {
            drained.push(next.name.clone());
            current = next.name;
        }

        drained.sort();
        assert_eq!(drained, vec!["a-main", "b-main", "c-main", "d-main"]);
        assert!(!state.is_active());
        assert_eq!(state.pending_len(), 0);
    }

    #[test]
    fn test_target_status_tracks_last_completion() {
        let mut state = OrchestratorState::new();
        state.admit(request("app", "main"));
        state.admit(request("api", "main"));

        let status = state.target_status("api-main");
        assert!(status.pending && !status.running);
        assert!(status.last.is_none());

        let failed = Outcome::Failed {
            stage: Stage::Pull,
            error: "no remote".to_string(),
        };
        state.complete("app-main", failed.clone());
        let status = state.target_status("app-main");
        assert!(!status.running);
        assert_eq!(
            status.last,
            Some(Completion {
                sequence: 1,
                outcome: failed,
            })
        );

        let status = state.target_status("api-main");
        assert!(status.running && !status.pending);
        state.complete("api-main", Outcome::Succeeded);
        let status = state.target_status("api-main");
        assert_eq!(status.completed, 2);
        assert_eq!(status.last.map(|c| c.sequence), Some(2));
    }
}
