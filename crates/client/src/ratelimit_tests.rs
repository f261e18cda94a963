// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::*;

#[tokio::test]
async fn first_acquire_is_immediate() {
    let limiter = RateLimiter::new(Duration::from_millis(200));
    let start = Instant::now();
    limiter.acquire().await;
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn consecutive_calls_are_spaced() {
    // 10 calls at 30ms spacing: total >= 9 * 30ms.
    let limiter = RateLimiter::new(Duration::from_millis(30));
    let start = Instant::now();
    for _ in 0..10 {
        limiter.acquire().await;
    }
    assert!(
        start.elapsed() >= Duration::from_millis(270),
        "elapsed: {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn concurrent_callers_are_serialized() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(25)));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            Instant::now()
        }));
    }
    let mut stamps = Vec::new();
    for h in handles {
        if let Ok(t) = h.await {
            stamps.push(t);
        }
    }
    stamps.sort();
    for pair in stamps.windows(2) {
        // Allow a little scheduling jitter under the nominal interval.
        assert!(
            pair[1].duration_since(pair[0]) >= Duration::from_millis(20),
            "stamps too close: {:?}",
            pair[1].duration_since(pair[0])
        );
    }
}

#[tokio::test]
async fn idle_gap_resets_the_wait() {
    let limiter = RateLimiter::new(Duration::from_millis(50));
    limiter.acquire().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    let start = Instant::now();
    limiter.acquire().await;
    assert!(start.elapsed() < Duration::from_millis(30));
}
