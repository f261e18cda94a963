// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace specs: the cross-crate flows the units cannot cover alone —
//! worker detach bookkeeping, the auto-load launch policy over a real
//! registry, fleet-lock exclusion intervals, and the spawned binary's
//! argument surface.

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use argosy::autoload::{AutoLoadEntry, AutoLoaderStore};
use argosy::registry::{epoch_secs, ProcessRegistry, WorkerRecord, FROZEN_THRESHOLD};
use argosy::worker::BackgroundGate;
use argosy_client::lock::{FleetLock, ShipClass};
use argosy_client::test_support::test_session;
use argosy_specs::{argosy_binary, StateDir};

// ── Worker detach + registry + auto-load interplay ─────────────────────

#[tokio::test]
#[serial]
async fn detached_worker_suppresses_its_own_autoload() -> anyhow::Result<()> {
    let _state = StateDir::new()?;

    // A worker crosses the background gate for "Transport Manager".
    let session = test_session("http://127.0.0.1:1");
    let gate = BackgroundGate::new(
        argosy::paths::handoff_marker_file("spec"),
        None,
        "s59-en".into(),
        "Zeno".into(),
    );
    gate.enter(&session, "Transport Manager")?;
    session.set_status("hauling");

    // The auto-loader now sees a healthy worker and does not spawn.
    let store = AutoLoaderStore::new("s59-en", "Zeno");
    store.add(AutoLoadEntry::new("Transport Manager", 30, vec![], "spec config"));
    let registry = ProcessRegistry::new("s59-en", "Zeno", FROZEN_THRESHOLD);
    let report = store.launch_enabled(&registry, |_| Ok(1));

    assert!(report.launched.is_empty());
    assert_eq!(report.skipped_running, vec!["Transport Manager".to_owned()]);
    Ok(())
}

#[tokio::test]
#[serial]
async fn frozen_worker_is_replaced_but_left_alive() -> anyhow::Result<()> {
    let _state = StateDir::new()?;

    // Registry shows a live worker whose heartbeat is 12 minutes old.
    let registry = ProcessRegistry::new("s59-en", "Zeno", FROZEN_THRESHOLD);
    let mut stale = WorkerRecord::new(std::process::id(), "Transport Manager");
    stale.last_heartbeat = epoch_secs() - 12 * 60;
    registry.register(stale);

    let store = AutoLoaderStore::new("s59-en", "Zeno");
    store.add(AutoLoadEntry::new("Transport Manager", 30, vec![], "spec config"));

    let report = store.launch_enabled(&registry, |_| Ok(555));
    assert_eq!(report.launched, vec![("Transport Manager".to_owned(), 555)]);
    assert_eq!(report.frozen_warned.len(), 1);

    // Both the stale entry and (in real life) the new PID coexist; this
    // path never kills.
    let live = registry.refresh();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].pid, std::process::id());
    Ok(())
}

// ── Fleet lock exclusion ────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn lock_holders_never_overlap() -> anyhow::Result<()> {
    let _state = StateDir::new()?;
    let tunables = argosy_client::config::Tunables {
        lock_poll_secs: 0,
        ..argosy_client::config::Tunables::fast()
    };

    // Two tasks contend for the same (account, class) lock and log their
    // hold intervals.
    let intervals = Arc::new(interval_log::Log::default());
    let mut handles = Vec::new();
    for _ in 0..2 {
        let tunables = tunables.clone();
        let intervals = Arc::clone(&intervals);
        handles.push(tokio::spawn(async move {
            let mut lock = FleetLock::new("s59-en", "Zeno", ShipClass::Merchant, &tunables);
            lock.acquire(Duration::from_secs(5)).await.map_err(|e| anyhow::anyhow!("{e}"))?;
            let start = std::time::Instant::now();
            tokio::time::sleep(Duration::from_millis(100)).await;
            intervals.push(start, std::time::Instant::now());
            lock.release();
            anyhow::Ok(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let spans = intervals.snapshot();
    assert_eq!(spans.len(), 2);
    let (a, b) = (&spans[0], &spans[1]);
    assert!(a.1 <= b.0 || b.1 <= a.0, "hold intervals overlap");
    Ok(())
}

/// Interval log shared by the contending tasks.
mod interval_log {
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    pub struct Log(Mutex<Vec<(Instant, Instant)>>);

    impl Log {
        pub fn push(&self, start: Instant, end: Instant) {
            if let Ok(mut log) = self.0.lock() {
                log.push((start, end));
            }
        }

        pub fn snapshot(&self) -> Vec<(Instant, Instant)> {
            self.0.lock().map(|l| l.clone()).unwrap_or_default()
        }
    }
}

// ── Spawned binary surface ──────────────────────────────────────────────

#[test]
fn binary_rejects_a_bad_log_format() -> anyhow::Result<()> {
    let output = std::process::Command::new(argosy_binary())
        .arg("--log-format")
        .arg("xml")
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("log-format"), "stderr: {stderr}");
    Ok(())
}

#[test]
#[serial]
fn worker_with_unknown_module_fails_cleanly() -> anyhow::Result<()> {
    let state = StateDir::new()?;

    let session_file = state.path().join("session.json");
    let handoff = state.path().join("handoff");
    let record = argosy_client::test_support::test_state("http://127.0.0.1:1");
    std::fs::write(&session_file, serde_json::to_vec(&record)?)?;

    let output = std::process::Command::new(argosy_binary())
        .env("ARGOSY_STATE_DIR", state.path())
        .arg("worker")
        .arg("--module")
        .arg("9999")
        .arg("--session")
        .arg(&session_file)
        .arg("--handoff")
        .arg(&handoff)
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    // The worker consumed the handoff file and never signalled.
    assert!(!session_file.exists());
    assert!(!handoff.exists());
    Ok(())
}

#[test]
fn help_lists_no_worker_subcommand() -> anyhow::Result<()> {
    let output = std::process::Command::new(argosy_binary()).arg("--help").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trade-fleet agent"));
    // The worker entry point is internal and hidden from help.
    assert!(!stdout.contains("worker"), "help: {stdout}");
    Ok(())
}
