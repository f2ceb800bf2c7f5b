//! WorkOS User Management client
//!
//! Talks to the hosted AuthKit endpoints over plain REST:
//! - `GET  /user_management/authorize` (browser redirect target)
//! - `POST /user_management/authenticate` (code exchange, password sign-in)
//! - `GET  /user_management/users` (connectivity probe)

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{AuthProvider, User};
use crate::config::ProviderConfig;
use crate::{Error, Result};

/// Hosted AuthKit provider name passed on the authorize URL
const AUTHKIT_PROVIDER: &str = "authkit";

/// WorkOS REST client
pub struct WorkOsClient {
    /// HTTP client (timeout configured, no retries)
    http: Client,
    /// API base URL without trailing slash
    base_url: String,
    /// OAuth client id
    client_id: String,
    /// API key, doubles as client secret
    api_key: SecretString,
}

/// Authenticate request body
#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(flatten)]
    grant: Grant<'a>,
}

/// Grant-specific fields of an authenticate request
#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum Grant<'a> {
    AuthorizationCode { code: &'a str },
    Password { email: &'a str, password: &'a str },
}

/// Authenticate response (tokens are ignored; the session is ours)
#[derive(Deserialize)]
struct AuthenticateResponse {
    user: User,
}

/// Paginated list response
#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// Error body; WorkOS uses both shapes depending on the endpoint
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    user_id: Option<String>,
}

impl WorkOsClient {
    /// Create a client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("authgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http_client(http, config))
    }

    /// Create a client with a caller-supplied HTTP client
    #[must_use]
    pub fn with_http_client(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into [`Error::Provider`]
    async fn provider_error(response: Response) -> Error {
        let status = response.status().as_u16();
        let body: ErrorBody = response.json().await.unwrap_or_default();

        let message = body
            .message
            .or(body.error_description)
            .or_else(|| body.error.clone())
            .unwrap_or_else(|| format!("Provider returned HTTP {status}"));
        let code = body.code.or(body.error);
        let user_id = body.user_id.or_else(|| {
            body.user
                .as_ref()
                .and_then(|u| u.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        warn!(status, code = ?code, "Identity provider request failed");
        Error::Provider {
            status,
            code,
            message,
            user_id,
        }
    }

    async fn authenticate(&self, grant: Grant<'_>) -> Result<User> {
        let response = self
            .http
            .post(self.endpoint("/user_management/authenticate"))
            .json(&AuthenticateRequest {
                client_id: &self.client_id,
                client_secret: self.api_key.expose_secret(),
                grant,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let body: AuthenticateResponse = response.json().await?;
        Ok(body.user)
    }
}

#[async_trait]
impl AuthProvider for WorkOsClient {
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.endpoint("/user_management/authorize"))
            .map_err(|e| Error::Config(format!("Invalid WORKOS_API_URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("provider", AUTHKIT_PROVIDER)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", state);

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<User> {
        debug!("Exchanging authorization code");
        self.authenticate(Grant::AuthorizationCode { code }).await
    }

    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<User> {
        debug!("Authenticating with password");
        self.authenticate(Grant::Password {
            email,
            password: password.expose_secret(),
        })
        .await
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<User>> {
        let response = self
            .http
            .get(self.endpoint("/user_management/users"))
            .bearer_auth(self.api_key.expose_secret())
            .query(&[("limit", limit)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let body: ListResponse<User> = response.json().await?;
        Ok(body.data)
    }

    fn api_origin(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .map(|u| u.origin().ascii_serialization())
    }
}
