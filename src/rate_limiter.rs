// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Per-Plugin Request Pacer
 * Fixed inter-request delay plus an optional token-bucket cap applied
 * around every transport call a running plugin makes
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use nonzero_ext::*;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Paces the requests of one running plugin.
///
/// The delay is purely additive and host-local; there is no cross-host
/// throttling at this layer.
pub struct RequestPacer {
    delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
    limiter: Option<Arc<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl RequestPacer {
    pub fn new(delay_ms: u64, rps: Option<u32>) -> Self {
        let limiter = rps.map(|rps| {
            let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(nonzero!(1u32)));
            Arc::new(GovernorRateLimiter::direct(quota))
        });

        if delay_ms > 0 || limiter.is_some() {
            debug!(
                "[Pacer] delay={}ms rps={:?}",
                delay_ms,
                rps
            );
        }

        Self {
            delay: Duration::from_millis(delay_ms),
            last_request: tokio::sync::Mutex::new(None),
            limiter,
        }
    }

    /// Wait until the next request is allowed.
    pub async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        if self.delay.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let due = previous + self.delay;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}
