//! Request handlers.

pub mod deployments;
pub mod health;
pub mod hooks;
pub mod status;
