//! Probe pacing.
//!
//! Applied on top of the concurrency bound when a target rate-limits
//! connection attempts.

use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Token bucket limiting probes per second. Clones share one bucket.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    /// At most `rate` probes per second, without an initial burst.
    pub fn new(rate: NonZeroU32) -> Self {
        let quota = Quota::per_second(rate).allow_burst(nonzero!(1u32));
        Self {
            limiter: Arc::new(DefaultDirectRateLimiter::direct(quota)),
        }
    }

    /// `None` for 0, meaning unlimited.
    pub fn per_second(rate: u32) -> Option<Self> {
        NonZeroU32::new(rate).map(Self::new)
    }

    /// Wait until the next probe may start.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
