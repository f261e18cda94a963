// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serial_test::serial;

use crate::registry::{epoch_secs, ProcessRegistry, WorkerRecord};

use super::*;

fn store() -> AutoLoaderStore {
    AutoLoaderStore::new("s59-en", "Zeno")
}

fn registry() -> ProcessRegistry {
    ProcessRegistry::new("s59-en", "Zeno", Duration::from_secs(600))
}

fn entry(name: &str) -> AutoLoadEntry {
    AutoLoadEntry::new(name, 30, vec!["a".to_owned(), "b".to_owned()], "test config")
}

#[test]
#[serial]
fn crud_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let store = store();
    assert!(store.load().is_empty());

    store.add(entry("Transport Manager"));
    store.add(entry("Wonder Watcher"));
    assert_eq!(store.load().len(), 2);

    assert_eq!(store.toggle(0), Some(false));
    assert!(!store.load()[0].enabled);
    assert_eq!(store.toggle(0), Some(true));
    assert_eq!(store.toggle(9), None);

    let removed = store.remove(1);
    assert_eq!(removed.map(|e| e.module_name), Some("Wonder Watcher".to_owned()));
    assert_eq!(store.load().len(), 1);

    assert!(store.find_by_module("Transport Manager").is_some());
    assert!(store.find_by_module("Gone").is_none());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn launches_enabled_entries_without_workers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let store = store();
    store.add(entry("Transport Manager"));
    let mut disabled = entry("Wonder Watcher");
    disabled.enabled = false;
    store.add(disabled);

    let mut spawned = Vec::new();
    let report = store.launch_enabled(&registry(), |e| {
        spawned.push(e.module_name.clone());
        Ok(4242)
    });

    // Exactly the enabled entry, nothing else.
    assert_eq!(spawned, vec!["Transport Manager".to_owned()]);
    assert_eq!(report.launched, vec![("Transport Manager".to_owned(), 4242)]);
    assert!(report.skipped_running.is_empty());

    // Launch bookkeeping persisted.
    let configs = store.load();
    assert_eq!(configs[0].launch_count, 1);
    assert!(configs[0].last_launched.is_some());
    assert_eq!(configs[1].launch_count, 0);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn healthy_workers_suppress_the_launch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let store = store();
    store.add(entry("Transport Manager"));
    // A live worker (this process) with a fresh heartbeat.
    registry().register(WorkerRecord::new(std::process::id(), "Transport Manager"));

    let report = store.launch_enabled(&registry(), |_| Ok(1));
    assert!(report.launched.is_empty());
    assert_eq!(report.skipped_running, vec!["Transport Manager".to_owned()]);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn frozen_worker_triggers_replacement_without_kill() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let store = store();
    store.add(entry("Transport Manager"));

    // Live PID, heartbeat 12 minutes stale.
    let mut stale = WorkerRecord::new(std::process::id(), "Transport Manager");
    stale.last_heartbeat = epoch_secs() - 12 * 60;
    registry().register(stale);

    let report = store.launch_enabled(&registry(), |_| Ok(777));
    assert_eq!(report.launched, vec![("Transport Manager".to_owned(), 777)]);
    assert_eq!(
        report.frozen_warned,
        vec![("Transport Manager".to_owned(), vec![std::process::id()])]
    );

    // The stale worker is still in the registry; this path never kills.
    let live = registry().refresh();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].pid, std::process::id());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn failed_spawns_are_reported_and_not_counted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let store = store();
    store.add(entry("Transport Manager"));

    let report = store.launch_enabled(&registry(), |_| anyhow::bail!("no binary"));
    assert!(report.launched.is_empty());
    assert_eq!(report.failed, vec!["Transport Manager".to_owned()]);
    assert_eq!(store.load()[0].launch_count, 0);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}
