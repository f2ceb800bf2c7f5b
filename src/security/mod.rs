//! Response hardening.
//!
//! Provides the browser security headers attached by the request gate.

pub mod headers;

pub use headers::{DEFAULT_PROVIDER_ORIGIN, SecurityHeaders};
