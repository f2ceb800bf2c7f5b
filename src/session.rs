//! Cookie-backed sessions
//!
//! The session lives entirely in the client: one cookie holding a signed
//! token from [`TokenService`]. The store only reads and writes that cookie.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;

use crate::config::{CookieConfig, SameSitePolicy};
use crate::provider::User;
use crate::token::TokenService;
use crate::{Error, Result};

/// Session state resolved for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Authenticated user, if the cookie held a valid token
    pub user: Option<User>,
}

impl Session {
    /// Session for an authenticated user
    #[must_use]
    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// Whether a valid token was presented
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Lax => Self::Lax,
            SameSitePolicy::Strict => Self::Strict,
            SameSitePolicy::None => Self::None,
        }
    }
}

/// Reads and writes the session cookie
#[derive(Debug, Clone)]
pub struct SessionStore {
    cookie: CookieConfig,
    tokens: Arc<TokenService>,
}

impl SessionStore {
    /// Create a store for the given cookie policy
    #[must_use]
    pub fn new(cookie: CookieConfig, tokens: Arc<TokenService>) -> Self {
        Self { cookie, tokens }
    }

    /// Token service used to verify cookies
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Build the session cookie carrying `token`
    #[must_use]
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie.name.clone(), token))
            .http_only(self.cookie.http_only)
            .secure(self.cookie.secure)
            .same_site(self.cookie.same_site.into())
            .path("/")
            .max_age(time::Duration::seconds(self.cookie.max_age_secs))
            .build()
    }

    /// Store `token` in the session cookie
    #[must_use]
    pub fn set_session(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.session_cookie(token))
    }

    /// Resolve the session from the request cookies.
    ///
    /// A missing or invalid cookie is an anonymous session, never an error.
    #[must_use]
    pub fn get_session(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(&self.cookie.name) else {
            return Session::default();
        };

        let user = self.tokens.verify(cookie.value());
        if user.is_none() {
            debug!(cookie = %self.cookie.name, "Ignoring invalid session cookie");
        }
        Session { user }
    }

    /// Expire the session cookie.
    ///
    /// Always emits a removal cookie, whether or not one was sent.
    #[must_use]
    pub fn clear_session(&self, jar: CookieJar) -> CookieJar {
        let mut removal = Cookie::build((self.cookie.name.clone(), ""))
            .http_only(self.cookie.http_only)
            .secure(self.cookie.secure)
            .same_site(self.cookie.same_site.into())
            .path("/")
            .build();
        removal.make_removal();
        jar.add(removal)
    }

    /// The authenticated user, or an authentication error
    pub fn require_user(&self, jar: &CookieJar) -> Result<User> {
        self.get_session(jar).user.ok_or_else(Error::unauthorized)
    }
}
