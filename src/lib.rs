//! authgate library
//!
//! Thin authentication front-end for a web application that delegates
//! identity to WorkOS AuthKit.
//!
//! # Features
//!
//! - **Delegated sign-in**: hosted AuthKit redirect, code exchange, callback
//! - **Stateless sessions**: HS256 session tokens in an `HttpOnly` cookie
//! - **Rate limiting**: fixed window per client address and path
//! - **Hardening**: security headers, CORS allow-list, safe redirects
//! - **Operations**: health and metrics endpoints, graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod process;
pub mod provider;
pub mod rate_limit;
pub mod security;
pub mod session;
pub mod token;
pub mod validation;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` wins over `level` when set.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
    }
}
