// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

fn record(url: &str) -> RequestRecord {
    RequestRecord {
        method: "GET",
        url: url.to_owned(),
        param_keys: vec![],
        payload_keys: vec![],
        status: None,
        elapsed: None,
    }
}

#[test]
fn keeps_only_the_newest_five() {
    let mut ring = RequestRing::new(5);
    for i in 0..8 {
        ring.push(record(&format!("r{i}")));
    }
    let snap = ring.snapshot();
    assert_eq!(snap.len(), 5);
    assert_eq!(snap[0].url, "r3");
    assert_eq!(snap[4].url, "r7");
}

#[test]
fn complete_last_attaches_outcome() {
    let mut ring = RequestRing::new(5);
    ring.push(record("a"));
    ring.push(record("b"));
    ring.complete_last(200, Duration::from_millis(12));

    let snap = ring.snapshot();
    assert_eq!(snap[0].status, None);
    assert_eq!(snap[1].status, Some(200));
    assert_eq!(snap[1].elapsed, Some(Duration::from_millis(12)));
}

#[test]
fn complete_on_empty_ring_is_a_noop() {
    let mut ring = RequestRing::new(5);
    ring.complete_last(500, Duration::ZERO);
    assert!(ring.is_empty());
}
