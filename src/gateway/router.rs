//! HTTP router and shared state

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    http::{HeaderMap, HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers;
use super::middleware::request_gate;
use super::outcome::Outcome;
use crate::config::Config;
use crate::error::ApiError;
use crate::provider::AuthProvider;
use crate::rate_limit::RateLimiter;
use crate::security::SecurityHeaders;
use crate::session::SessionStore;
use crate::token::TokenService;
use crate::{Error, Result};

/// Shared application state
pub struct AppState {
    /// Validated configuration
    pub config: Arc<Config>,
    /// Identity provider
    pub provider: Arc<dyn AuthProvider>,
    /// Session cookie reader/writer
    pub sessions: SessionStore,
    /// Per-client rate limiter
    pub rate_limiter: RateLimiter,
    /// Security headers attached to every response
    pub security_headers: Option<SecurityHeaders>,
    /// Process start, for uptime reporting
    pub started: Instant,
}

impl AppState {
    /// Build state from configuration and a provider
    pub fn new(config: Config, provider: Arc<dyn AuthProvider>) -> Result<Self> {
        let tokens = Arc::new(TokenService::from_config(&config)?);
        let sessions = SessionStore::new(config.session.cookie.clone(), tokens);
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        let security_headers = config.security.headers_enabled.then(|| {
            SecurityHeaders::new(
                provider.api_origin().as_deref(),
                config.environment.is_production(),
            )
        });

        Ok(Self {
            config: Arc::new(config),
            provider,
            sessions,
            rate_limiter,
            security_headers,
            started: Instant::now(),
        })
    }

    /// Replace the rate limiter (e.g. to plug in a shared store)
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Whether internal error messages are hidden from clients
    #[must_use]
    pub fn redact_errors(&self) -> bool {
        self.config.environment.is_production()
    }

    /// Wrap an error for rendering under this deployment's redaction policy
    #[must_use]
    pub fn api_error(&self, error: Error) -> ApiError {
        ApiError::new(error, self.redact_errors())
    }

    /// Failed outcome for `error`
    #[must_use]
    pub fn fail(&self, error: Error) -> Outcome {
        Outcome::Failed(self.api_error(error))
    }

    /// Redirect to `location`, or a failure under this deployment's
    /// redaction policy when it is not a valid header value
    #[must_use]
    pub fn redirect(&self, location: &str) -> Outcome {
        Outcome::redirect(location).unwrap_or_else(|e| self.fail(e))
    }

    /// Hosts an absolute redirect may point at: the request host and the
    /// configured public host
    #[must_use]
    pub fn allowed_redirect_hosts(&self, headers: &HeaderMap) -> Vec<String> {
        let mut hosts = Vec::with_capacity(2);
        if let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
            hosts.push(host.to_ascii_lowercase());
        }
        if let Some(app_host) = self.config.app_host()
            && !hosts.contains(&app_host)
        {
            hosts.push(app_host);
        }
        hosts
    }

    /// Whether `path` requires a session
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.config.security.protected_paths.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            !prefix.is_empty()
                && (path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/')))
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.security.cors_allowed_origins);

    let router = Router::new()
        .route("/auth/signin", get(handlers::auth::sign_in))
        .route(
            "/auth/signin/password",
            post(handlers::auth::sign_in_with_password),
        )
        .route("/auth/callback", get(handlers::auth::callback))
        .route(
            "/auth/signout",
            get(handlers::auth::sign_out).post(handlers::auth::sign_out),
        )
        .route("/auth/error", get(handlers::auth::auth_error))
        .route("/api/health", get(handlers::health::health))
        .route("/api/metrics", get(handlers::metrics::metrics))
        .route("/api/session", get(handlers::auth::current_session))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            request_gate,
        ));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins; `None` when the list is empty
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim_end_matches('/')) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
    )
}
