//! Deployment lifecycle events.

use serde::{Deserialize, Serialize};
use shipwright_core::Trigger;
use std::fmt;

/// Step of a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pull,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Pull => f.write_str("pull"),
            Stage::Run => f.write_str("run"),
        }
    }
}

/// Published on the orchestrator's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeploymentEvent {
    Queued {
        name: String,
        replaced: bool,
    },
    Started {
        name: String,
        trigger: Trigger,
    },
    Succeeded {
        name: String,
        duration_ms: u64,
    },
    Failed {
        name: String,
        stage: Stage,
        error: String,
    },
    /// The lock was released with nothing pending.
    Idle,
}

impl DeploymentEvent {
    /// Name of the deployment the event concerns, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            DeploymentEvent::Queued { name, .. }
            | DeploymentEvent::Started { name, .. }
            | DeploymentEvent::Succeeded { name, .. }
            | DeploymentEvent::Failed { name, .. } => Some(name),
            DeploymentEvent::Idle => None,
        }
    }

    /// True for `Succeeded` and `Failed`.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            DeploymentEvent::Succeeded { .. } | DeploymentEvent::Failed { .. }
        )
    }
}
