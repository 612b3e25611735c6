//! Push hook handler.
//!
//! Always answers `200` with an empty body: the sender never learns whether
//! the request was trusted, matched a target, or deployed successfully.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
};
use shipwright_core::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::AppState;

const EVENT_HEADER: &str = "x-github-event";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub async fn push(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let source = client_address(&headers, peer, state.trust_forwarded_for);

    if let Some(event) = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok())
        && event != "push"
    {
        debug!(source = %source, event = %event, "Ignoring non-push event");
        return StatusCode::OK;
    }

    match state.admission.admit(source, &body).await {
        Ok(request) => {
            let name = request.name.clone();
            let outcome = state.orchestrator.submit(request);
            info!(source = %source, name = %name, outcome = ?outcome, "Push accepted");
        }
        Err(Error::TargetNotFound(name)) => {
            debug!(source = %source, name = %name, "No deployment defined for push");
        }
        Err(e) => {
            warn!(source = %source, error = %e, "Push rejected");
        }
    }

    StatusCode::OK
}

/// The peer address, or the first `X-Forwarded-For` entry when trusted.
pub(crate) fn client_address(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for
        && let Some(forwarded) = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    {
        return forwarded;
    }
    peer.ip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_client_address_ignores_forwarded_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("10.1.2.3"));
        assert_eq!(client_address(&headers, peer(), false), peer().ip());
    }

    #[test]
    fn test_client_address_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("10.1.2.3, 172.16.0.1"),
        );
        assert_eq!(
            client_address(&headers, peer(), true),
            "10.1.2.3".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_client_address_falls_back_on_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("unknown"));
        assert_eq!(client_address(&headers, peer(), true), peer().ip());
    }
}
