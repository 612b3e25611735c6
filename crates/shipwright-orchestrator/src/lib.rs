//! Deployment orchestration for Shipwright.
//!
//! The [`Orchestrator`] serializes every deployment on the host behind one
//! lock and collapses requests that arrive while busy into a per-name
//! pending slot. The [`ScheduleBinder`] arms cron timers that feed it.

pub mod binder;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use binder::{BoundSchedule, ScheduleBinder};
pub use events::{DeploymentEvent, Stage};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use state::{Admission, Completion, OrchestratorState, Outcome, Snapshot, TargetStatus};
