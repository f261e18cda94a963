// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use argosy_client::test_support::test_session;

use crate::paths;
use crate::prompts::{Prompter, RecordingPrompter};
use crate::registry::{ProcessRegistry, FROZEN_THRESHOLD};

use super::*;

#[tokio::test]
#[serial]
async fn gate_registers_and_signals() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let session = test_session("http://127.0.0.1:1");
    let marker = paths::handoff_marker_file("gate-test");
    let gate = BackgroundGate::new(marker.clone(), None, "s59-en".into(), "Zeno".into());

    assert!(!gate.entered());
    gate.enter(&session, "Transport Manager")?;
    assert!(gate.entered());
    assert!(marker.exists());

    let registry = ProcessRegistry::new("s59-en", "Zeno", FROZEN_THRESHOLD);
    let live = registry.refresh();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].pid, std::process::id());
    assert_eq!(live[0].label, "Transport Manager");

    // Status updates now flow into the registry row.
    session.set_status("under way");
    let live = registry.refresh();
    assert_eq!(live[0].status, "under way");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn gate_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let session = test_session("http://127.0.0.1:1");
    let marker = paths::handoff_marker_file("gate-twice");
    let gate = BackgroundGate::new(marker.clone(), None, "s59-en".into(), "Zeno".into());

    gate.enter(&session, "Job")?;
    std::fs::remove_file(&marker)?;
    // Second crossing must not recreate the marker or re-register.
    gate.enter(&session, "Job")?;
    assert!(!marker.exists());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[tokio::test]
#[serial]
async fn gate_flushes_recorded_inputs() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let session = test_session("http://127.0.0.1:1");
    let recorder = Arc::new(RecordingPrompter::new(
        Arc::new(argosy_client::prompt::Headless) as Arc<dyn Prompter>
    ));
    recorder.read_line("q1");
    recorder.read_line("q2");

    let marker = paths::handoff_marker_file("gate-record");
    let gate = BackgroundGate::new(
        marker,
        Some(Arc::clone(&recorder)),
        "s59-en".into(),
        "Zeno".into(),
    );
    gate.enter(&session, "Recorded Job")?;

    let inputs = crate::prompts::take_recorded_inputs();
    assert_eq!(inputs, Some(vec![String::new(), String::new()]));

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
fn frozen_threshold_matches_the_spec_default() {
    assert_eq!(FROZEN_THRESHOLD, Duration::from_secs(600));
}
