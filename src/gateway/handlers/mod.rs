//! Route handlers

pub mod auth;
pub mod health;
pub mod metrics;

use axum::http::StatusCode;
use serde_json::json;

use super::outcome::Outcome;
use crate::error::codes;

/// `Cache-Control` for responses that describe live process state
pub(crate) const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Fallback for unknown routes
pub async fn not_found() -> Outcome {
    Outcome::Rendered(
        StatusCode::NOT_FOUND,
        json!({ "error": { "message": "Not found", "code": codes::NOT_FOUND } }),
    )
}
