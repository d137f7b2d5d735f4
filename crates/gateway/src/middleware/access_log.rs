//! Per-request access logging and HTTP metrics

use axum::{
    extract::{ConnectInfo, MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use factcheck_common::metrics::RequestMetrics;
use std::net::SocketAddr;

/// Log client ip, method, path, status and duration for every request
pub async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let ip = client_ip(&request);

    let metrics = RequestMetrics::start(&method, &endpoint);
    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = metrics.finish(status);

    tracing::info!(
        ip = %ip,
        method = %method,
        path = %path,
        status,
        duration_ms,
        "Request completed"
    );

    response
}

/// First `X-Forwarded-For` hop, else the peer address
fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_forwarded_header_wins() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));

        assert_eq!(client_ip(&request), "203.0.113.7");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request), "unknown");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(client_ip(&request), "127.0.0.1");
    }
}
