//! Shipwright Core
//!
//! Core domain types, traits, and error handling for Shipwright.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the orchestrator, the target registry and the hook API.

pub mod error;
pub mod ports;
pub mod request;
pub mod schedule;

pub use error::{Error, Result};
pub use request::{DeploymentRequest, Trigger};
pub use schedule::ScheduleSpec;
