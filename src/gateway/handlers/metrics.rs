//! Process metrics for signed-in users

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, header},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::debug;

use super::NO_CACHE;
use crate::gateway::outcome::Outcome;
use crate::gateway::router::AppState;
use crate::process;

/// GET /api/metrics
pub async fn metrics(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let no_cache = [(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE))];
    let user = match state.sessions.require_user(&jar) {
        Ok(user) => user,
        Err(e) => return (no_cache, state.fail(e)),
    };
    debug!(user_id = %user.id, "Serving metrics");

    let body = json!({
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "memory": process::memory_usage(),
        "cpu": process::cpu_usage(),
        "uptime": state.started.elapsed().as_secs_f64(),
        "version": env!("CARGO_PKG_VERSION"),
    });
    (no_cache, Outcome::ok(body))
}
