// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimum-interval gate in front of every outbound game request.
//!
//! The game flags clients that talk too fast, so all traffic of one session
//! funnels through `acquire()` immediately before the HTTP call. The mutex
//! is held across the sleep so concurrent callers are serialized in arrival
//! order rather than stampeding when the interval elapses.

use std::time::Duration;

use tokio::time::Instant;

pub struct RateLimiter {
    min_interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last: tokio::sync::Mutex::new(None) }
    }

    /// Block until at least `min_interval` has passed since the previous
    /// permitted call, then record this call as the newest.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
