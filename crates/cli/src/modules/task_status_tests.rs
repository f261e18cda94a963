// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serial_test::serial;

use crate::registry::{epoch_secs, ProcessRegistry, WorkerRecord};

use super::*;

#[test]
#[serial]
fn description_flags_frozen_workers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let registry = ProcessRegistry::new("s59-en", "Zeno", Duration::from_secs(600));

    let fresh = WorkerRecord::new(4242, "Transport Manager");
    let line = describe(&registry, &fresh);
    assert!(line.starts_with("[OK]"), "line: {line}");
    assert!(line.contains("pid 4242"));

    let mut stale = WorkerRecord::new(4243, "Transport Manager");
    stale.last_heartbeat = epoch_secs() - 15 * 60;
    stale.status = "waiting for ships".to_owned();
    let line = describe(&registry, &stale);
    assert!(line.starts_with("[FROZEN]"), "line: {line}");
    assert!(line.contains("waiting for ships"));

    let mut paused = WorkerRecord::new(4244, "Transport Manager");
    paused.status = "[PAUSED] next batch in 6h".to_owned();
    let line = describe(&registry, &paused);
    assert!(line.starts_with("[PAUSED]"), "line: {line}");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}
