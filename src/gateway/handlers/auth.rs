//! Sign-in, callback, sign-out and session routes

use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::Error;
use crate::error::codes;
use crate::gateway::outcome::Outcome;
use crate::gateway::router::AppState;
use crate::session::Session;
use crate::validation::{safe_return_to, sanitize_input, validate_sign_in};

/// Where users land after sign-in when no valid target was requested
pub const DEFAULT_RETURN_TO: &str = "/dashboard";

/// Where users land after sign-out when no valid target was requested
pub const DEFAULT_SIGN_OUT_TO: &str = "/";

/// Page that asks the user to verify their email address
pub const VERIFY_EMAIL_PATH: &str = "/verify-email";

/// Page that completes a multi-factor challenge
pub const MFA_PATH: &str = "/mfa";

/// Shown when the email/password pair is rejected
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Shown for any other password sign-in rejection
pub const SIGN_IN_FAILED: &str = "An error occurred during sign in. Please try again.";

/// Round-tripped through the provider in the `state` parameter
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInState {
    return_to: String,
}

/// Query for `/auth/signin` and `/auth/signout`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnToParams {
    /// Requested post-action location
    pub return_to: Option<String>,
}

/// Query the provider sends to `/auth/callback`
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Opaque state from sign-in
    pub state: Option<String>,
    /// Provider error code
    pub error: Option<String>,
    /// Provider error text
    pub error_description: Option<String>,
}

/// Form posted to `/auth/signin/password`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSignInForm {
    /// Email address as typed
    #[serde(default)]
    pub email: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Requested post-sign-in location
    pub return_to: Option<String>,
}

/// Query for `/auth/error`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorParams {
    /// Message to show
    pub message: Option<String>,
}

fn encode_state(return_to: &str) -> String {
    let payload = json!({ "returnTo": return_to }).to_string();
    URL_SAFE_NO_PAD.encode(payload)
}

fn decode_state(state: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(state)
        .or_else(|_| STANDARD.decode(state))
        .ok()?;
    serde_json::from_slice::<SignInState>(&bytes)
        .ok()
        .map(|s| s.return_to)
}

/// GET /auth/signin - redirect to the hosted sign-in page
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReturnToParams>,
) -> Outcome {
    let return_to = params
        .return_to
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_RETURN_TO.to_string());

    match state
        .provider
        .authorization_url(&state.config.callback_url(), &encode_state(&return_to))
    {
        Ok(url) => state.redirect(&url),
        Err(e) => state.fail(e),
    }
}

/// GET /auth/callback - finish sign-in
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Outcome) {
    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        let message = sanitize_input(
            params
                .error_description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(error),
        );
        warn!(error = %error, message = %message, "Provider returned an error on callback");
        return (jar, state.redirect(&with_query("/auth/error", "message", &message)));
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return (jar, state.fail(Error::validation("Authorization code is missing")));
    };

    let user = match state.provider.exchange_code(code).await {
        Ok(user) => user,
        Err(e) => return (jar, state.fail(e)),
    };

    let token = match state.sessions.tokens().issue(&user) {
        Ok(token) => token,
        Err(e) => return (jar, state.fail(e)),
    };

    let allowed = state.allowed_redirect_hosts(&headers);
    let target = params
        .state
        .as_deref()
        .and_then(decode_state)
        .and_then(|r| safe_return_to(&r, &allowed))
        .unwrap_or_else(|| DEFAULT_RETURN_TO.to_string());

    info!(user_id = %user.id, "User signed in");
    (
        state.sessions.set_session(jar, token),
        state.redirect(&target),
    )
}

/// POST /auth/signin/password - sign in with an email address and password
pub async fn sign_in_with_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<PasswordSignInForm>,
) -> (CookieJar, Outcome) {
    let credentials = match validate_sign_in(&form.email, &form.password) {
        Ok(credentials) => credentials,
        Err(e) => return (jar, state.fail(e)),
    };

    let user = match state
        .provider
        .authenticate_with_password(&credentials.email, &credentials.password)
        .await
    {
        Ok(user) => user,
        Err(e) => return (jar, password_rejection(&state, &credentials.email, e)),
    };

    let token = match state.sessions.tokens().issue(&user) {
        Ok(token) => token,
        Err(e) => return (jar, state.fail(e)),
    };

    let allowed = state.allowed_redirect_hosts(&headers);
    let target = form
        .return_to
        .as_deref()
        .and_then(|r| safe_return_to(r, &allowed))
        .unwrap_or_else(|| DEFAULT_RETURN_TO.to_string());

    info!(user_id = %user.id, email = %user.email, "User signed in with password");
    (
        state.sessions.set_session(jar, token),
        state.redirect(&target),
    )
}

/// Map a password sign-in failure to what the browser sees
fn password_rejection(state: &AppState, email: &str, error: Error) -> Outcome {
    let (code, user_id) = match error {
        Error::Provider { code, user_id, .. } => (code, user_id),
        other => return state.fail(other),
    };
    warn!(email = %email, code = ?code, "Password sign-in failed");

    match code.as_deref() {
        Some("invalid_credentials" | "user_not_found") => {
            state.fail(Error::Authentication(INVALID_CREDENTIALS.to_string()))
        }
        Some("email_verification_required") => {
            state.redirect(&with_query(VERIFY_EMAIL_PATH, "email", email))
        }
        Some("mfa_required") => match user_id {
            Some(id) => state.redirect(&with_query(MFA_PATH, "userId", &id)),
            None => state.redirect(MFA_PATH),
        },
        _ => state.fail(Error::Authentication(SIGN_IN_FAILED.to_string())),
    }
}

/// `path?name=<urlencoded value>`
fn with_query(path: &str, name: &str, value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{path}?{name}={encoded}")
}

/// GET|POST /auth/signout - clear the session
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReturnToParams>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Outcome) {
    if let Some(user) = state.sessions.get_session(&jar).user {
        info!(user_id = %user.id, email = %user.email, "User signed out");
    }

    let allowed = state.allowed_redirect_hosts(&headers);
    let target = params
        .return_to
        .as_deref()
        .and_then(|r| safe_return_to(r, &allowed))
        .unwrap_or_else(|| DEFAULT_SIGN_OUT_TO.to_string());

    (state.sessions.clear_session(jar), state.redirect(&target))
}

/// GET /auth/error - landing page for failed sign-ins
pub async fn auth_error(Query(params): Query<ErrorParams>) -> Outcome {
    let message = params
        .message
        .map(|m| sanitize_input(&m))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Authentication failed".to_string());

    Outcome::Rendered(
        StatusCode::BAD_REQUEST,
        json!({ "error": { "message": message, "code": codes::AUTH_ERROR } }),
    )
}

/// GET /api/session - who is signed in
pub async fn current_session(Extension(session): Extension<Session>) -> Outcome {
    let user = session.user.as_ref().map(crate::provider::User::to_public);
    Outcome::ok(json!({
        "authenticated": session.is_authenticated(),
        "user": user,
    }))
}
