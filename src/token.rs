//! Session tokens
//!
//! A session token is an HS256 JWT whose payload carries the full [`User`]
//! claim plus `iat`, `exp` and a random `jti`. Verification never fails
//! loudly: anything that is not a well-formed, correctly signed, unexpired
//! token simply yields no user.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::provider::User;
use crate::{Error, Result};

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    user: User,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Issues and verifies session tokens with a shared HMAC key
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("key", &"[REDACTED]")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a service from raw key bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty.
    pub fn new(secret: &[u8], default_ttl: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("Session signing key is empty".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            default_ttl,
        })
    }

    /// Create a service from the decoded `JWT_SECRET_KEY`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.jwt_secret()?, config.session.token_ttl)
    }

    /// Issue a token with the default lifetime
    pub fn issue(&self, user: &User) -> Result<String> {
        self.issue_with_ttl(user, self.default_ttl)
    }

    /// Issue a token expiring `ttl` from now
    pub fn issue_with_ttl(&self, user: &User, ttl: Duration) -> Result<String> {
        self.issue_at(user, ttl, unix_now())
    }

    fn issue_at(&self, user: &User, ttl: Duration, iat: u64) -> Result<String> {
        let claims = Claims {
            user: user.clone(),
            iat,
            exp: iat.saturating_add(ttl.as_secs()),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Verify a token and return the embedded user.
    ///
    /// Returns `None` for malformed, tampered, wrongly signed or expired
    /// tokens.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<User> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims.user),
            Err(e) => {
                debug!(error = %e, "Session token rejected");
                None
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn service() -> TokenService {
        TokenService::new(b"test-signing-key-0123456789abcdef", DEFAULT_TOKEN_TTL).unwrap()
    }

    fn user() -> User {
        let mut user = User::new("user_01H", "ada@example.com");
        user.first_name = Some("Ada".to_string());
        user.email_verified = true;
        user.extra.insert("organizationId".to_string(), json!("org_1"));
        user
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let svc = service();
        let token = svc.issue(&user()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(svc.verify(&token), Some(user()));
    }

    #[test]
    fn claims_carry_iat_exp_and_unique_jti() {
        let svc = service();
        let a = svc.issue_at(&user(), Duration::from_secs(60), 1_000).unwrap();
        let b = svc.issue_at(&user(), Duration::from_secs(60), 1_000).unwrap();
        assert_ne!(a, b);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = jsonwebtoken::decode::<Claims>(&a, &svc.decoding, &validation)
            .unwrap()
            .claims;
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_060);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn expired_token_rejected() {
        let svc = service();
        let token = svc.issue_at(&user(), Duration::from_secs(60), 1_000).unwrap();
        assert_eq!(svc.verify(&token), None);
    }

    #[test]
    fn short_lived_token_expires() {
        let svc = service();
        let token = svc.issue_with_ttl(&user(), Duration::from_secs(1)).unwrap();
        assert!(svc.verify(&token).is_some());
        std::thread::sleep(Duration::from_millis(2_100));
        assert_eq!(svc.verify(&token), None);
    }

    #[test]
    fn token_from_other_key_rejected() {
        let other = TokenService::new(b"another-key", DEFAULT_TOKEN_TTL).unwrap();
        let token = other.issue(&user()).unwrap();
        assert_eq!(service().verify(&token), None);
    }

    #[test]
    fn any_signature_change_rejected() {
        let svc = service();
        let token = svc.issue(&user()).unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;

        for i in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered != token {
                assert_eq!(svc.verify(&tampered), None, "tampered at {i}");
            }
        }
    }

    #[test]
    fn garbage_rejected() {
        let svc = service();
        assert_eq!(svc.verify(""), None);
        assert_eq!(svc.verify("not-a-token"), None);
        assert_eq!(svc.verify("a.b.c"), None);
    }

    #[test]
    fn empty_key_refused() {
        assert!(TokenService::new(b"", DEFAULT_TOKEN_TTL).is_err());
    }

    #[test]
    fn debug_hides_key() {
        let debug = format!("{:?}", service());
        assert!(!debug.contains("test-signing-key"));
    }
}
