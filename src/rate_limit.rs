//! Fixed-window rate limiting
//!
//! Each key gets a window of `window` length that admits `max_requests`
//! requests. The first request after a window has elapsed starts a new one.
//! Windows live in a [`RateLimitStore`]; the in-memory store is swept
//! periodically by the server.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// A live window for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Requests admitted in this window
    pub count: u32,
    /// When the window ends (ms since the Unix epoch)
    pub reset_at: u64,
}

/// Storage for rate limit windows.
///
/// `hit` must apply the fixed-window transition atomically per key.
pub trait RateLimitStore: Send + Sync {
    /// Record a request for `key` at `now` and return whether it is admitted,
    /// along with the window after the update.
    fn hit(&self, key: &str, now: u64, max_requests: u32, window_ms: u64) -> (bool, Window);

    /// Drop windows that ended before `now`. Returns how many were removed.
    fn sweep(&self, now: u64) -> usize;

    /// Number of live windows
    fn len(&self) -> usize;

    /// Whether the store holds no windows
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store backed by a sharded map
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: DashMap<String, Window>,
}

impl MemoryRateLimitStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current window for `key`, if any
    #[must_use]
    pub fn window(&self, key: &str) -> Option<Window> {
        self.windows.get(key).map(|w| *w)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn hit(&self, key: &str, now: u64, max_requests: u32, window_ms: u64) -> (bool, Window) {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: 0,
        });
        let window = entry.value_mut();

        if window.count == 0 || now > window.reset_at {
            *window = Window {
                count: 1,
                reset_at: now.saturating_add(window_ms),
            };
            return (true, *window);
        }

        if window.count < max_requests {
            window.count += 1;
            (true, *window)
        } else {
            (false, *window)
        }
    }

    fn sweep(&self, now: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| w.reset_at >= now);
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured maximum per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Window end (ms since the Unix epoch)
    pub reset_at: u64,
    /// Seconds to wait before retrying (0 when allowed)
    pub retry_after: u64,
}

impl Decision {
    fn unlimited(limit: u32) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_at: 0,
            retry_after: 0,
        }
    }
}

/// Fixed-window rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("windows", &self.store.len())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter with an in-memory store
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryRateLimitStore::new()))
    }

    /// Create a limiter with a custom store
    #[must_use]
    pub fn with_store(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { config, store }
    }

    /// Whether requests are being limited at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check and record a request for `key` now
    #[must_use]
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, now_millis())
    }

    /// Check and record a request for `key` at `now` (ms since the epoch)
    #[must_use]
    pub fn check_at(&self, key: &str, now: u64) -> Decision {
        let limit = self.config.max_requests;
        if !self.config.enabled {
            return Decision::unlimited(limit);
        }

        let window_ms = u64::try_from(self.config.window.as_millis()).unwrap_or(u64::MAX);
        let (allowed, window) = self.store.hit(key, now, limit, window_ms);

        let retry_after = if allowed {
            0
        } else {
            window.reset_at.saturating_sub(now).div_ceil(1000)
        };

        if !allowed {
            warn!(key = %key, retry_after, "Rate limit exceeded");
        }

        Decision {
            allowed,
            limit,
            remaining: limit.saturating_sub(window.count),
            reset_at: window.reset_at,
            retry_after,
        }
    }

    /// Remove expired windows
    pub fn sweep(&self) -> usize {
        self.sweep_at(now_millis())
    }

    /// Remove windows that ended before `now`
    pub fn sweep_at(&self, now: u64) -> usize {
        let removed = self.store.sweep(now);
        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "Swept expired rate limit windows");
        }
        removed
    }

    /// Interval between sweeps
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        self.config.cleanup_interval
    }
}

/// Milliseconds since the Unix epoch
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
