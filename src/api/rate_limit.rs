use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::debug;

use super::{ApiError, AppState};
use crate::services::PolicyClass;

const UNKNOWN_CLIENT: &str = "unknown";

/// Resolves the address requests are counted against.
///
/// `X-Forwarded-For` is honoured only when the socket peer is a configured
/// trusted proxy; otherwise the peer address is used as is.
pub fn client_address(request: &Request, trusted_proxies: &[String]) -> String {
    let Some(peer) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    else {
        return UNKNOWN_CLIENT.to_string();
    };

    if is_trusted(peer, trusted_proxies)
        && let Some(forwarded) = forwarded_for(request.headers())
    {
        return forwarded.to_string();
    }

    peer.to_string()
}

fn is_trusted(peer: IpAddr, trusted_proxies: &[String]) -> bool {
    trusted_proxies
        .iter()
        .filter_map(|ip| ip.trim().parse::<IpAddr>().ok())
        .any(|ip| ip == peer)
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

async fn enforce(
    state: &AppState,
    class: PolicyClass,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_address(&request, &state.config().server.trusted_proxy_ips);

    match state.request_gate().check(&client, class) {
        Ok(admission) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("ratelimit-limit", HeaderValue::from(admission.limit));
            headers.insert("ratelimit-remaining", HeaderValue::from(admission.remaining));
            Ok(response)
        }
        Err(limited) => {
            metrics::counter!("rate_limit_rejections_total", "class" => class.as_str())
                .increment(1);
            debug!(client = %client, class = %class, "Request rate limited");

            Err(ApiError::RateLimited {
                limit: limited.limit,
                retry_after_secs: limited.retry_after.as_secs(),
            })
        }
    }
}

pub async fn limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, PolicyClass::Auth, request, next).await
}

pub async fn limit_public(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, PolicyClass::Public, request, next).await
}

pub async fn limit_ingest(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, PolicyClass::Ingest, request, next).await
}
