//! Error types for Shipwright.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Admission errors
    #[error("Untrusted source address: {0}")]
    UntrustedSource(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported ref: {0}")]
    UnsupportedRef(String),

    // Target errors
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Invalid target definition at {path}: {message}")]
    InvalidDefinition { path: String, message: String },

    // Deployment errors
    #[error("Pull failed for {target}: {message}")]
    PullFailed { target: String, message: String },

    #[error("Run failed for {target}: {message}")]
    RunFailed { target: String, message: String },

    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    // Scheduling errors
    #[error("Invalid schedule: {0}")]
    Schedule(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
