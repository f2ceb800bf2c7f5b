//! Request gate
//!
//! Runs in front of every route, in order:
//! 1. rate limit check (429 short-circuit)
//! 2. session resolution, with protected-path enforcement
//! 3. security and rate limit response headers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use super::router::AppState;
use crate::Error;
use crate::rate_limit::Decision;

/// Header carrying the per-window limit
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Header carrying the requests left in the window
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Header carrying the window end (RFC 3339)
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Gate middleware
pub async fn request_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let decision = state.rate_limiter.is_enabled().then(|| {
        let key = rate_limit_key(&request, &path);
        state.rate_limiter.check(&key)
    });

    if let Some(d) = decision.filter(|d| !d.allowed) {
        let response = state
            .api_error(Error::RateLimited {
                retry_after: d.retry_after,
            })
            .into_response();
        return finish(&state, response, Some(&d));
    }

    let jar = CookieJar::from_headers(request.headers());
    let session = state.sessions.get_session(&jar);

    if !session.is_authenticated() && state.is_protected(&path) {
        debug!(path = %path, "Unauthenticated request to protected path");
        let response = if path.starts_with("/api/") {
            state.fail(Error::unauthorized()).into_response()
        } else {
            let return_to = request
                .uri()
                .path_and_query()
                .map_or(path.as_str(), |pq| pq.as_str());
            state.redirect(&sign_in_location(return_to)).into_response()
        };
        return finish(&state, response, decision.as_ref());
    }

    request.extensions_mut().insert(session);
    let response = next.run(request).await;
    finish(&state, response, decision.as_ref())
}

fn finish(state: &AppState, mut response: Response, decision: Option<&Decision>) -> Response {
    let headers = response.headers_mut();
    if let Some(d) = decision {
        apply_rate_limit_headers(headers, d);
    }
    if let Some(security) = &state.security_headers {
        security.apply(headers);
    }
    response
}

/// `/auth/signin` URL that returns to `return_to` after sign-in
#[must_use]
pub fn sign_in_location(return_to: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
    format!("/auth/signin?returnTo={encoded}")
}

/// Rate limit key: client address plus path.
///
/// The client address is the first `X-Forwarded-For` entry, else the socket
/// peer, else `unknown`.
#[must_use]
pub fn rate_limit_key<B>(request: &Request<B>, path: &str) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let client = forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    format!("{client}:{path}")
}

/// Set `X-RateLimit-*` headers from a decision
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));

    let reset = i64::try_from(decision.reset_at)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
    if let Some(value) = reset.and_then(|r| HeaderValue::try_from(r).ok()) {
        headers.insert(X_RATELIMIT_RESET, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/health");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn key_uses_first_forwarded_address() {
        let req = request(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")]);
        assert_eq!(rate_limit_key(&req, "/api/health"), "203.0.113.7:/api/health");
    }

    #[test]
    fn key_falls_back_to_peer_address() {
        let mut req = request(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4711))));
        assert_eq!(rate_limit_key(&req, "/x"), "192.0.2.1:/x");
    }

    #[test]
    fn key_falls_back_to_unknown() {
        assert_eq!(rate_limit_key(&request(&[]), "/x"), "unknown:/x");
    }

    #[test]
    fn rate_limit_headers_rendered() {
        let mut headers = HeaderMap::new();
        apply_rate_limit_headers(
            &mut headers,
            &Decision {
                allowed: false,
                limit: 100,
                remaining: 0,
                reset_at: 1_700_000_000_000,
                retry_after: 12,
            },
        );
        assert_eq!(headers[X_RATELIMIT_LIMIT], "100");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[X_RATELIMIT_RESET], "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn sign_in_location_encodes_return_path() {
        assert_eq!(
            sign_in_location("/dashboard/settings?tab=a&b=c"),
            "/auth/signin?returnTo=%2Fdashboard%2Fsettings%3Ftab%3Da%26b%3Dc"
        );
    }
}
