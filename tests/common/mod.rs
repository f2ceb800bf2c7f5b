//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tower::ServiceExt;

use authgate::config::{
    AppEnv, Config, CookieConfig, HealthConfig, LogConfig, ProviderConfig, RateLimitConfig,
    SecurityConfig, ServerConfig, SessionConfig,
};
use authgate::gateway::{AppState, create_router};
use authgate::provider::{AuthProvider, User};
use authgate::{Error, Result};

/// base64 of "integration-test-signing-key"
pub const SECRET_B64: &str = "aW50ZWdyYXRpb24tdGVzdC1zaWduaW5nLWtleQ==";

/// Valid development configuration
pub fn test_config() -> Config {
    Config {
        environment: AppEnv::Development,
        app_url: "http://localhost:3000".to_string(),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        provider: ProviderConfig {
            client_id: "client_test".to_string(),
            api_key: SecretString::from("sk_test".to_string()),
            api_url: "https://api.workos.com".to_string(),
            timeout: Duration::from_secs(1),
        },
        session: SessionConfig {
            jwt_secret_key: SecretString::from(SECRET_B64.to_string()),
            token_ttl: Duration::from_secs(3600),
            cookie: CookieConfig::default(),
        },
        rate_limit: RateLimitConfig::default(),
        security: SecurityConfig {
            headers_enabled: true,
            cors_allowed_origins: Vec::new(),
            protected_paths: vec!["/dashboard".to_string(), "/api/account".to_string()],
        },
        health: HealthConfig::default(),
        log: LogConfig::default(),
    }
}

/// Password the fake provider accepts for [`ada`]
pub const ADA_PASSWORD: &str = "correct-horse";

/// The user the fake provider signs in
pub fn ada() -> User {
    let mut user = User::new("user_01ADA", "ada@example.com");
    user.first_name = Some("Ada".to_string());
    user.last_name = Some("Lovelace".to_string());
    user.email_verified = true;
    user
}

/// In-memory identity provider
#[derive(Default)]
pub struct FakeProvider {
    /// Fail code exchange with this (status, code)
    pub exchange_error: Option<(u16, &'static str)>,
    /// Fail the connectivity probe
    pub unreachable: bool,
    /// Fail password sign-in with this (status, code), naming ada's id
    pub password_error: Option<(u16, &'static str)>,
    /// Number of `list_users` calls
    pub probes: AtomicUsize,
    /// Emails seen by password sign-in
    pub password_emails: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn password_emails(&self) -> Vec<String> {
        self.password_emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = url::Url::parse("https://auth.example.test/authorize")
            .map_err(|e| Error::Internal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<User> {
        if let Some((status, provider_code)) = self.exchange_error {
            return Err(Error::Provider {
                status,
                code: Some(provider_code.to_string()),
                message: format!("code {code} rejected"),
                user_id: None,
            });
        }
        Ok(ada())
    }

    async fn authenticate_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<User> {
        self.password_emails.lock().unwrap().push(email.to_string());
        if let Some((status, provider_code)) = self.password_error {
            return Err(Error::Provider {
                status,
                code: Some(provider_code.to_string()),
                message: format!("{provider_code} for {email}"),
                user_id: Some(ada().id),
            });
        }
        if email == ada().email && password.expose_secret() == ADA_PASSWORD {
            Ok(ada())
        } else {
            Err(Error::Provider {
                status: 400,
                code: Some("invalid_credentials".to_string()),
                message: "Invalid credentials.".to_string(),
                user_id: None,
            })
        }
    }

    async fn list_users(&self, _limit: u32) -> Result<Vec<User>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            Err(Error::Provider {
                status: 503,
                code: None,
                message: "unreachable".to_string(),
                user_id: None,
            })
        } else {
            Ok(vec![ada()])
        }
    }
}

/// Router over `config` and `provider`
pub fn app(config: Config, provider: Arc<FakeProvider>) -> Router {
    let state = AppState::new(config, provider).unwrap();
    create_router(Arc::new(state))
}

/// Send a GET with optional headers
pub async fn get(app: &Router, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
    send(app, "GET", uri, headers).await
}

/// POST an urlencoded form
pub async fn post_form(
    app: &Router,
    uri: &str,
    form: &[(&str, &str)],
    headers: &[(&str, &str)],
) -> Response<Body> {
    let body: String = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Send a request with any method
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Response body as JSON
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `Location` header
pub fn location(response: &Response<Body>) -> &str {
    response.headers()["location"].to_str().unwrap()
}

/// `name=value` pair of the first `Set-Cookie` header
pub fn set_cookie_pair(response: &Response<Body>) -> String {
    response.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}
