//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::router::{AppState, create_router};
use crate::config::Config;
use crate::provider::{AuthProvider, WorkOsClient};
use crate::rate_limit::RateLimiter;
use crate::security::SecurityHeaders;
use crate::{Error, Result};

/// authgate server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Identity provider
    provider: Arc<dyn AuthProvider>,
}

impl Gateway {
    /// Create a server talking to WorkOS
    pub fn new(config: Config) -> Result<Self> {
        let provider = Arc::new(WorkOsClient::new(&config.provider)?);
        Ok(Self::with_provider(config, provider))
    }

    /// Create a server with a custom identity provider
    #[must_use]
    pub fn with_provider(config: Config, provider: Arc<dyn AuthProvider>) -> Self {
        Self { config, provider }
    }

    /// Run until SIGINT/SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(AppState::new(self.config, self.provider)?);
        let config = Arc::clone(&state.config);
        let hsts = state
            .security_headers
            .as_ref()
            .map(SecurityHeaders::sends_hsts);

        let sweeper = state
            .rate_limiter
            .is_enabled()
            .then(|| spawn_sweeper(state.rate_limiter.clone(), shutdown_tx.subscribe()));

        let app = create_router(state);
        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("AUTHGATE v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %config.server.host, port = %config.server.port, "Listening");
        info!(environment = %config.environment, app_url = %config.app_url, "Public URL");
        info!(callback = %config.callback_url(), "OAuth redirect URI");

        if config.rate_limit.enabled {
            info!(
                max_requests = config.rate_limit.max_requests,
                window_ms = u64::try_from(config.rate_limit.window.as_millis()).unwrap_or(u64::MAX),
                "RATE LIMITING enabled"
            );
        } else {
            warn!("RATE LIMITING disabled");
        }
        match hsts {
            Some(hsts) => info!(hsts, "SECURITY HEADERS enabled"),
            None => warn!("SECURITY HEADERS disabled"),
        }
        if !config.session.cookie.secure {
            warn!("Session cookie is not marked Secure");
        }
        info!(paths = ?config.security.protected_paths, "Protected paths");
        info!("============================================================");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        if let Some(handle) = sweeper {
            let _ = handle.await;
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Periodically drop expired rate limit windows until shutdown
pub fn spawn_sweeper(limiter: RateLimiter, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.cleanup_interval());
        // first tick completes immediately
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    limiter.sweep();
                }
                _ = shutdown_rx.recv() => {
                    debug!("Rate limit sweeper stopped");
                    break;
                }
            }
        }
    })
}

/// Shutdown signal handler
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
