//! Browser security response headers

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

/// Provider origin used in `connect-src` when none is known
pub const DEFAULT_PROVIDER_ORIGIN: &str = "https://api.workos.com";

/// CSP used if the provider origin cannot be placed in a header
const FALLBACK_CSP: &str = "default-src 'self'; \
     script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
     style-src 'self' 'unsafe-inline'; \
     img-src 'self' data: https:; \
     font-src 'self'; \
     connect-src 'self' https://api.workos.com";

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

/// Precomputed set of security headers
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    csp: HeaderValue,
    hsts: bool,
}

impl SecurityHeaders {
    /// Build the header set.
    ///
    /// `provider_origin` is allowed in `connect-src`; HSTS is only sent when
    /// `production` is set.
    #[must_use]
    pub fn new(provider_origin: Option<&str>, production: bool) -> Self {
        let origin = provider_origin.unwrap_or(DEFAULT_PROVIDER_ORIGIN);
        let csp = HeaderValue::try_from(content_security_policy(origin))
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CSP));

        Self {
            csp,
            hsts: production,
        }
    }

    /// Whether `Strict-Transport-Security` is emitted
    #[must_use]
    pub fn sends_hsts(&self) -> bool {
        self.hsts
    }

    /// Add the headers to a response, replacing existing values
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        );
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(header::CONTENT_SECURITY_POLICY, self.csp.clone());
        headers.insert(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
        );

        if self.hsts {
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_VALUE),
            );
        }
    }
}

fn content_security_policy(provider_origin: &str) -> String {
    format!(
        "default-src 'self'; \
         script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
         style-src 'self' 'unsafe-inline'; \
         img-src 'self' data: https:; \
         font-src 'self'; \
         connect-src 'self' {provider_origin}"
    )
}
