//! Integration test infrastructure for Shipwright.
//!
//! Provides in-memory targets and registries, a hook server bound to a
//! random local port, and payload fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use shipwright_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new(&[("app-main", FakeBehavior::default())]).await.unwrap();
//!     // Use ctx.client, ctx.orchestrator, ctx.recorder, etc.
//! }
//! ```

pub mod context;
pub mod fakes;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fakes::*;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,shipwright_orchestrator=debug")),
        )
        .with_test_writer()
        .try_init();
}
