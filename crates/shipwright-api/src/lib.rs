//! Push hook HTTP server for Shipwright.

pub mod admission;
pub mod allowlist;
pub mod handlers;
pub mod middleware;
pub mod payload;
pub mod routes;
pub mod state;

pub use admission::AdmissionFilter;
pub use allowlist::{AllowList, AllowListError};
pub use handlers::deployments::DeployAccepted;
pub use routes::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the application router.
pub fn build_app(state: Arc<AppState>) -> axum::Router {
    create_router(state)
}

/// Serve on `listener` until the process exits. Handlers see the peer
/// address through `ConnectInfo`.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_app(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
