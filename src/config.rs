//! Configuration management
//!
//! All settings come from flat, upper-case environment variables (optionally
//! seeded from a YAML file with the same keys in lower case). The raw
//! [`Settings`] are extracted once, shaped into a [`Config`], and validated
//! before the server starts.

use std::{fmt, path::Path, time::Duration};

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::{Error, Result};

/// Environment variables read by [`Config::load`]
pub const ENV_KEYS: &[&str] = &[
    "WORKOS_CLIENT_ID",
    "WORKOS_API_KEY",
    "WORKOS_API_URL",
    "JWT_SECRET_KEY",
    "APP_ENV",
    "APP_URL",
    "HOST",
    "PORT",
    "SECURE_HEADERS_ENABLED",
    "RATE_LIMIT_ENABLED",
    "RATE_LIMIT_MAX_REQUESTS",
    "RATE_LIMIT_WINDOW_MS",
    "RATE_LIMIT_CLEANUP_INTERVAL_MS",
    "SESSION_COOKIE_NAME",
    "SESSION_COOKIE_MAX_AGE",
    "SESSION_COOKIE_SECURE",
    "SESSION_COOKIE_HTTPONLY",
    "SESSION_COOKIE_SAMESITE",
    "CORS_ALLOWED_ORIGINS",
    "PROTECTED_PATHS",
    "HEALTH_STRICT",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_WORKOS_API_URL: &str = "https://api.workos.com";

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    /// Local development (full error messages, debug logging)
    #[default]
    Development,
    /// Test runs
    Test,
    /// Production (redacted errors, HSTS)
    Production,
}

impl AppEnv {
    /// Whether this is a production deployment
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// Log level used when none is configured
    #[must_use]
    pub fn default_log_level(self) -> &'static str {
        if self.is_production() { "info" } else { "debug" }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        })
    }
}

/// `SameSite` policy for the session cookie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    /// `SameSite=Lax`
    #[default]
    Lax,
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=None` (requires `Secure`)
    None,
}

/// Flat settings exactly as they appear in the environment.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    #[serde(deserialize_with = "flexible::string")]
    workos_client_id: String,
    #[serde(deserialize_with = "flexible::string")]
    workos_api_key: String,
    #[serde(deserialize_with = "flexible::string")]
    workos_api_url: String,
    #[serde(deserialize_with = "flexible::string")]
    jwt_secret_key: String,
    app_env: AppEnv,
    #[serde(deserialize_with = "flexible::string")]
    app_url: String,
    #[serde(deserialize_with = "flexible::string")]
    host: String,
    port: u16,
    secure_headers_enabled: bool,
    rate_limit_enabled: bool,
    rate_limit_max_requests: u32,
    rate_limit_window_ms: u64,
    rate_limit_cleanup_interval_ms: u64,
    #[serde(deserialize_with = "flexible::string")]
    session_cookie_name: String,
    session_cookie_max_age: i64,
    session_cookie_secure: bool,
    session_cookie_httponly: bool,
    session_cookie_samesite: SameSitePolicy,
    #[serde(deserialize_with = "flexible::list")]
    cors_allowed_origins: Vec<String>,
    #[serde(deserialize_with = "flexible::list")]
    protected_paths: Vec<String>,
    health_strict: bool,
    log_level: Option<String>,
    log_format: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workos_client_id: String::new(),
            workos_api_key: String::new(),
            workos_api_url: DEFAULT_WORKOS_API_URL.to_string(),
            jwt_secret_key: String::new(),
            app_env: AppEnv::default(),
            app_url: DEFAULT_APP_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            secure_headers_enabled: true,
            rate_limit_enabled: true,
            rate_limit_max_requests: 100,
            rate_limit_window_ms: 900_000,
            rate_limit_cleanup_interval_ms: 60_000,
            session_cookie_name: "authkit_session".to_string(),
            session_cookie_max_age: 86_400,
            session_cookie_secure: true,
            session_cookie_httponly: true,
            session_cookie_samesite: SameSitePolicy::default(),
            cors_allowed_origins: Vec::new(),
            protected_paths: vec!["/dashboard".to_string()],
            health_strict: false,
            log_level: None,
            log_format: None,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment
    pub environment: AppEnv,
    /// Public base URL of this service (used for the OAuth redirect URI)
    pub app_url: String,
    /// Server configuration
    pub server: ServerConfig,
    /// Identity provider configuration
    pub provider: ProviderConfig,
    /// Session token and cookie configuration
    pub session: SessionConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Security headers, CORS and protected paths
    pub security: SecurityConfig,
    /// Health check policy
    pub health: HealthConfig,
    /// Logging configuration
    pub log: LogConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

/// Identity provider (WorkOS) configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OAuth client id
    pub client_id: String,
    /// API key, also used as the client secret for code exchange
    pub api_key: SecretString,
    /// Base URL of the provider API
    pub api_url: String,
    /// Timeout for a single provider call
    pub timeout: Duration,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base64-encoded HMAC key for session tokens
    pub jwt_secret_key: SecretString,
    /// Lifetime of issued session tokens
    pub token_ttl: Duration,
    /// Cookie attributes
    pub cookie: CookieConfig,
}

/// Session cookie attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    /// Cookie name
    pub name: String,
    /// `Max-Age` in seconds
    pub max_age_secs: i64,
    /// `Secure` flag
    pub secure: bool,
    /// `HttpOnly` flag
    pub http_only: bool,
    /// `SameSite` policy
    pub same_site: SameSitePolicy,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "authkit_session".to_string(),
            max_age_secs: 86_400,
            secure: true,
            http_only: true,
            same_site: SameSitePolicy::Lax,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Requests allowed per key per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
    /// Interval between sweeps of expired windows
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_millis(900_000),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Attach security response headers
    pub headers_enabled: bool,
    /// Origins allowed for CORS (empty = no CORS headers)
    pub cors_allowed_origins: Vec<String>,
    /// Path prefixes that require a session
    pub protected_paths: Vec<String>,
}

/// Health check configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthConfig {
    /// Report `unhealthy` instead of `degraded` when the provider is unreachable
    pub strict: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level / filter directive
    pub level: Option<String>,
    /// Output format (`text` or `json`)
    pub format: Option<String>,
}

impl From<Settings> for Config {
    fn from(s: Settings) -> Self {
        Self {
            environment: s.app_env,
            app_url: s.app_url.trim_end_matches('/').to_string(),
            server: ServerConfig {
                host: s.host,
                port: s.port,
            },
            provider: ProviderConfig {
                client_id: s.workos_client_id,
                api_key: SecretString::from(s.workos_api_key),
                api_url: s.workos_api_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(10),
            },
            session: SessionConfig {
                jwt_secret_key: SecretString::from(s.jwt_secret_key),
                token_ttl: Duration::from_secs(3600),
                cookie: CookieConfig {
                    name: s.session_cookie_name,
                    max_age_secs: s.session_cookie_max_age,
                    secure: s.session_cookie_secure,
                    http_only: s.session_cookie_httponly,
                    same_site: s.session_cookie_samesite,
                },
            },
            rate_limit: RateLimitConfig {
                enabled: s.rate_limit_enabled,
                max_requests: s.rate_limit_max_requests,
                window: Duration::from_millis(s.rate_limit_window_ms),
                cleanup_interval: Duration::from_millis(s.rate_limit_cleanup_interval_ms),
            },
            security: SecurityConfig {
                headers_enabled: s.secure_headers_enabled,
                cors_allowed_origins: s.cors_allowed_origins,
                protected_paths: s.protected_paths,
            },
            health: HealthConfig {
                strict: s.health_strict,
            },
            log: LogConfig {
                level: s.log_level,
                format: s.log_format,
            },
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file and the environment.
    ///
    /// Environment variables win over the file. Only the keys in [`ENV_KEYS`]
    /// are read. The result is not validated; call [`Config::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or a value has the
    /// wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::raw().only(ENV_KEYS));

        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(settings.into())
    }

    /// Check every invariant and report all violations at once.
    ///
    /// Cheap and side-effect free, so the health endpoint re-runs it.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.provider.client_id.trim().is_empty() {
            problems.push("WORKOS_CLIENT_ID is required".to_string());
        }
        if self.provider.api_key.expose_secret().trim().is_empty() {
            problems.push("WORKOS_API_KEY is required".to_string());
        }
        if self.session.jwt_secret_key.expose_secret().trim().is_empty() {
            problems.push("JWT_SECRET_KEY is required".to_string());
        } else if self.jwt_secret().is_err() {
            problems.push("JWT_SECRET_KEY must be base64-encoded".to_string());
        }

        if !is_http_url(&self.app_url) {
            problems.push(format!("APP_URL is not a valid http(s) URL: {}", self.app_url));
        }
        if !is_http_url(&self.provider.api_url) {
            problems.push(format!(
                "WORKOS_API_URL is not a valid http(s) URL: {}",
                self.provider.api_url
            ));
        }
        for origin in &self.security.cors_allowed_origins {
            if !is_http_url(origin) {
                problems.push(format!("CORS_ALLOWED_ORIGINS entry is not a URL: {origin}"));
            }
        }

        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                problems.push("RATE_LIMIT_MAX_REQUESTS must be greater than 0".to_string());
            }
            if self.rate_limit.window.is_zero() {
                problems.push("RATE_LIMIT_WINDOW_MS must be greater than 0".to_string());
            }
            if self.rate_limit.cleanup_interval.is_zero() {
                problems.push("RATE_LIMIT_CLEANUP_INTERVAL_MS must be greater than 0".to_string());
            }
        }

        let cookie = &self.session.cookie;
        if cookie.name.trim().is_empty() {
            problems.push("SESSION_COOKIE_NAME must not be empty".to_string());
        }
        if cookie.max_age_secs < 0 {
            problems.push("SESSION_COOKIE_MAX_AGE must not be negative".to_string());
        }
        if cookie.same_site == SameSitePolicy::None && !cookie.secure {
            problems.push(
                "SESSION_COOKIE_SAMESITE=none requires SESSION_COOKIE_SECURE=true".to_string(),
            );
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }

    /// Decoded session signing key
    pub fn jwt_secret(&self) -> Result<Vec<u8>> {
        decode_secret(self.session.jwt_secret_key.expose_secret())
    }

    /// Redirect URI registered with the provider
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.app_url)
    }

    /// `host[:port]` of the public base URL
    #[must_use]
    pub fn app_host(&self) -> Option<String> {
        let url = Url::parse(&self.app_url).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Effective log level
    #[must_use]
    pub fn log_level(&self) -> &str {
        self.log
            .level
            .as_deref()
            .unwrap_or_else(|| self.environment.default_log_level())
    }
}

/// Decode a base64 secret, accepting padded, unpadded and URL-safe forms.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let secret = secret.trim();
    STANDARD
        .decode(secret)
        .or_else(|_| STANDARD_NO_PAD.decode(secret))
        .or_else(|_| URL_SAFE_NO_PAD.decode(secret))
        .map_err(|e| Error::Config(format!("Invalid base64 secret: {e}")))
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Lenient deserializers for values that pass through environment parsing.
///
/// figment parses `12345` as a number and `a,b` as a string; these accept
/// whatever shape arrives and produce the field type.
mod flexible {
    use super::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    impl Scalar {
        fn into_string(self) -> String {
            match self {
                Self::Str(s) => s,
                Self::Int(i) => i.to_string(),
                Self::UInt(u) => u.to_string(),
                Self::Float(f) => f.to_string(),
                Self::Bool(b) => b.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        One(Scalar),
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Scalar::deserialize(deserializer).map(Scalar::into_string)
    }

    pub fn list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = match ListOrString::deserialize(deserializer)? {
            ListOrString::List(items) => items,
            ListOrString::One(one) => one
                .into_string()
                .split(',')
                .map(str::to_string)
                .collect(),
        };
        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}
