use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;
use tracing::Level;

use crate::error::FailureDetail;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Route template reported for requests served by the SPA fallback.
pub const FALLBACK_ROUTE: &str = "/*";

/// Route template for the health check.
pub const STATUS_ROUTE: &str = "/status";

/// Matched route template, copied onto the response for the logger.
#[derive(Debug, Clone)]
pub struct RouteTemplate(pub String);

/// Route-level middleware: remember which route template served the request.
///
/// Only matched routes run this, so its absence marks the fallback.
pub async fn tag_route(request: Request, next: Next) -> Response {
    let template = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());

    let mut response = next.run(request).await;
    if let Some(template) = template {
        response.extensions_mut().insert(RouteTemplate(template));
    }
    response
}

/// Health checks are noisy, the SPA fallback even more so.
pub fn severity_for(route: &str) -> Level {
    match route {
        STATUS_ROUTE => Level::DEBUG,
        FALLBACK_ROUTE => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Client IP from proxy headers (when trusted) or the socket.
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> IpAddr {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }

    connect_info
        .map(|c| c.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Global response logger. One line per request once the handler has produced
/// its response; failures are reported with the same request id.
pub async fn log_response(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.config.http.trust_proxy,
    );
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();
    let route = response
        .extensions()
        .get::<RouteTemplate>()
        .map(|r| r.0.as_str())
        .unwrap_or(FALLBACK_ROUTE);

    if let Some(failure) = response.extensions().get::<FailureDetail>() {
        if failure.status >= 500 {
            tracing::error!(request_id = %request_id, status = failure.status, error = %failure.detail, "request failed");
        } else {
            tracing::debug!(request_id = %request_id, status = failure.status, reason = %failure.detail, "request rejected");
        }
    }

    let elapsed = format!("{:.2}ms", elapsed_ms);
    macro_rules! http_line {
        ($level:expr) => {
            tracing::event!(
                target: "http",
                $level,
                request_id = %request_id,
                ip = %ip,
                method = %method,
                path = %uri,
                status,
                elapsed = %elapsed,
                "{} {} {} -> {} in {}",
                request_id, method, uri, status, elapsed
            )
        };
    }

    let level = severity_for(route);
    if level == Level::TRACE {
        http_line!(Level::TRACE);
    } else if level == Level::DEBUG {
        http_line!(Level::DEBUG);
    } else {
        http_line!(Level::INFO);
    }

    response
}
