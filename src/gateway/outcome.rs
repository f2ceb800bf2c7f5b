//! Handler results
//!
//! Handlers never redirect or fail by returning early with an error; they
//! produce an [`Outcome`] and the boundary turns it into a response.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::ApiError;
use crate::{Error, Result};

/// What a handler decided to do
#[derive(Debug)]
pub enum Outcome {
    /// 302 to the given location
    Redirect(HeaderValue),
    /// JSON body with a status
    Rendered(StatusCode, Value),
    /// Error response
    Failed(ApiError),
}

impl Outcome {
    /// 302 to `location`, if it can be sent as a header value
    pub fn redirect(location: &str) -> Result<Self> {
        HeaderValue::from_str(location)
            .map(Self::Redirect)
            .map_err(|e| Error::Internal(format!("Invalid redirect location: {e}")))
    }

    /// 200 with a JSON body
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::Rendered(StatusCode::OK, body)
    }

    /// HTTP status this outcome renders with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Redirect(_) => StatusCode::FOUND,
            Self::Rendered(status, _) => *status,
            Self::Failed(err) => err.error().status_code(),
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(location) => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Self::Rendered(status, body) => (status, Json(body)).into_response(),
            Self::Failed(err) => err.into_response(),
        }
    }
}
