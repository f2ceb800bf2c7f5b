//! Redirect target, form and free-text input validation

use secrecy::SecretString;
use serde_json::{Map, Value, json};
use url::Url;

use crate::{Error, Result};

/// Longest free-text value kept by [`sanitize_input`], in characters
pub const MAX_INPUT_LEN: usize = 1000;

/// Whether `url` is an absolute http(s) URL whose host is allow-listed.
///
/// Hosts are compared as `host[:port]`. An empty allow-list accepts any
/// host.
#[must_use]
pub fn is_valid_redirect_url(url: &str, allowed_hosts: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    if allowed_hosts.is_empty() {
        return true;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host))
}

/// Whether `path` is a same-origin path such as `/dashboard?tab=1`.
///
/// Rejects protocol-relative (`//host`) and backslash forms that browsers
/// treat as another origin.
#[must_use]
pub fn is_safe_relative_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.starts_with("/\\")
        && !path.chars().any(char::is_control)
}

/// The redirect target to use for `candidate`, if it is acceptable
#[must_use]
pub fn safe_return_to(candidate: &str, allowed_hosts: &[String]) -> Option<String> {
    let candidate = candidate.trim();
    // Url::parse drops tabs and newlines, so check the raw text first.
    // Targets end up in a Location header and must be percent-encoded ASCII.
    if candidate.is_empty() || candidate.chars().any(|c| c.is_control() || !c.is_ascii()) {
        return None;
    }
    if is_safe_relative_path(candidate) {
        return Some(candidate.to_string());
    }
    if !allowed_hosts.is_empty() && is_valid_redirect_url(candidate, allowed_hosts) {
        return Some(candidate.to_string());
    }
    None
}

/// Trim, drop angle brackets, and cap length.
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .take(MAX_INPUT_LEN)
        .collect()
}

/// Message for a malformed email address
pub const INVALID_EMAIL: &str = "Please provide a valid email address";

/// Message for a missing required field
pub const REQUIRED_FIELD: &str = "This field is required";

/// Validated email/password sign-in form
#[derive(Debug)]
pub struct Credentials {
    /// Trimmed, lower-cased email address
    pub email: String,
    /// Password, passed to the provider unchanged
    pub password: SecretString,
}

/// Whether `email` looks like `local@domain.tld`
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels
            .iter()
            .all(|l| !l.is_empty() && !l.starts_with('-') && !l.ends_with('-'))
}

/// Validate a sign-in form.
///
/// Every failing field is reported at once in `details`, keyed by field
/// name.
pub fn validate_sign_in(email: &str, password: &str) -> Result<Credentials> {
    let email = email.trim().to_lowercase();
    let mut fields = Map::new();

    if email.is_empty() {
        fields.insert("email".to_string(), json!([REQUIRED_FIELD]));
    } else if !is_valid_email(&email) {
        fields.insert("email".to_string(), json!([INVALID_EMAIL]));
    }
    if password.is_empty() {
        fields.insert("password".to_string(), json!([REQUIRED_FIELD]));
    }

    if fields.is_empty() {
        return Ok(Credentials {
            email,
            password: SecretString::from(password.to_string()),
        });
    }

    let message = fields
        .iter()
        .filter_map(|(field, errors)| Some(format!("{field}: {}", errors[0].as_str()?)))
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::Validation {
        message,
        details: Some(Value::Object(fields)),
    })
}
