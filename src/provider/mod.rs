//! Identity provider abstraction.
//!
//! Everything that touches the hosted identity platform goes through the
//! [`AuthProvider`] trait: building the hosted sign-in URL, exchanging an
//! authorization code or a password for a user, and a cheap read used as a
//! connectivity probe. [`WorkOsClient`] is the production implementation; tests plug in
//! their own.

mod workos;

pub use workos::WorkOsClient;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

// ============================================================================
// User
// ============================================================================

/// A user as reported by the identity provider.
///
/// This is the identity claim embedded in session tokens. Fields this crate
/// does not know about are kept in `extra` so the claim survives a
/// token round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Provider user id
    pub id: String,
    /// Primary email address
    pub email: String,
    /// Given name
    #[serde(default, alias = "first_name", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default, alias = "last_name", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Whether the email address has been verified
    #[serde(default, alias = "email_verified")]
    pub email_verified: bool,
    /// Avatar URL
    #[serde(
        default,
        alias = "profile_picture_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_picture_url: Option<String>,
    /// Creation timestamp (RFC 3339, as sent by the provider)
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (RFC 3339, as sent by the provider)
    #[serde(default, alias = "updated_at", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Any other provider fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Minimal user with only the required fields set
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            email_verified: false,
            profile_picture_url: None,
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }

    /// Public view without provider-internal fields
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email_verified: self.email_verified,
            profile_picture_url: self.profile_picture_url.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// The subset of [`User`] that is returned to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Provider user id
    pub id: String,
    /// Primary email address
    pub email: String,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Whether the email address has been verified
    pub email_verified: bool,
    /// Avatar URL
    pub profile_picture_url: Option<String>,
    /// Creation timestamp
    pub created_at: Option<String>,
    /// Last update timestamp
    pub updated_at: Option<String>,
}

// ============================================================================
// AuthProvider trait
// ============================================================================

/// Capability interface to the hosted identity provider.
///
/// Every call is attempted exactly once; callers decide what a failure means.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Hosted sign-in URL the browser is redirected to.
    ///
    /// `state` is passed through untouched and comes back on the callback.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String>;

    /// Exchange an authorization code for the authenticated user.
    async fn exchange_code(&self, code: &str) -> Result<User>;

    /// Authenticate with an email address and password.
    ///
    /// Rejections come back as [`crate::Error::Provider`] carrying the
    /// provider's error code (`invalid_credentials`, `mfa_required`, ...).
    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<User>;

    /// List up to `limit` users. Used as a read-only connectivity probe.
    async fn list_users(&self, limit: u32) -> Result<Vec<User>>;

    /// Origin of the provider API, for the `connect-src` CSP directive
    fn api_origin(&self) -> Option<String> {
        None
    }
}
