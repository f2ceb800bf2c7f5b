//! Health endpoint

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::IntoResponse,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::NO_CACHE;
use crate::gateway::outcome::Outcome;
use crate::gateway::router::AppState;

/// Overall health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything works
    Healthy,
    /// Configuration is fine but the provider is unreachable
    Degraded,
    /// Not able to serve sign-ins
    Unhealthy,
}

impl HealthStatus {
    /// Combine individual checks
    #[must_use]
    pub fn from_checks(environment: bool, provider: bool, strict: bool) -> Self {
        match (environment, provider) {
            (false, _) => Self::Unhealthy,
            (true, true) => Self::Healthy,
            (true, false) if strict => Self::Unhealthy,
            (true, false) => Self::Degraded,
        }
    }

    /// HTTP status reported for this state
    #[must_use]
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Healthy => StatusCode::OK,
            Self::Degraded | Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// GET|HEAD /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = Instant::now();

    let environment = match state.config.validate() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check: configuration invalid");
            false
        }
    };

    let provider = match state.provider.list_users(1).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Health check: identity provider unreachable");
            false
        }
    };

    let status = HealthStatus::from_checks(environment, provider, state.config.health.strict);
    let body = json!({
        "status": status,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "uptime": state.started.elapsed().as_secs_f64(),
        "checks": {
            "environment": environment,
            "workos": provider,
        },
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.to_string(),
    });

    let elapsed = format!("{}ms", started.elapsed().as_millis());
    (
        [
            (header::CACHE_CONTROL, NO_CACHE.to_string()),
            (HeaderName::from_static("x-response-time"), elapsed),
        ],
        Outcome::Rendered(status.http_status(), body),
    )
}
