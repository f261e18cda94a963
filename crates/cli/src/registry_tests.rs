// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serial_test::serial;

use super::*;

fn registry() -> ProcessRegistry {
    ProcessRegistry::new("s59-en", "Zeno", Duration::from_secs(600))
}

/// A PID that is guaranteed dead: a short-lived child we already reaped.
fn dead_pid() -> anyhow::Result<u32> {
    let mut child = std::process::Command::new("true").spawn()?;
    let pid = child.id();
    child.wait()?;
    Ok(pid)
}

#[test]
#[serial]
fn register_and_refresh_keep_our_own_pid() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();
    reg.register(WorkerRecord::new(std::process::id(), "Transport Manager"));

    let live = reg.refresh();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].pid, std::process::id());
    assert_eq!(live[0].label, "Transport Manager");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn refresh_drops_dead_pids() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();
    reg.register(WorkerRecord::new(dead_pid()?, "Ghost"));
    reg.register(WorkerRecord::new(std::process::id(), "Live"));

    let live = reg.refresh();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].label, "Live");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn refresh_drops_reused_pids_of_other_programs() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    // A live process that is definitely not this test binary.
    let mut child = std::process::Command::new("sleep").arg("30").spawn()?;

    let reg = registry();
    reg.register(WorkerRecord::new(child.id(), "Imposter"));
    let live = reg.refresh();
    assert!(live.is_empty(), "foreign comm must be dropped: {live:?}");

    let _ = child.kill();
    let _ = child.wait();
    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn register_is_idempotent_per_pid() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();
    reg.register(WorkerRecord::new(std::process::id(), "First"));
    reg.register(WorkerRecord::new(std::process::id(), "Second"));

    let live = reg.refresh();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].label, "Second");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn update_status_refreshes_the_heartbeat() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();
    let mut record = WorkerRecord::new(std::process::id(), "Worker");
    record.last_heartbeat = 0;
    reg.register(record);

    reg.update_status(std::process::id(), "hauling wood");
    let live = reg.refresh();
    assert_eq!(live[0].status, "hauling wood");
    assert!(reg.heartbeat_age(&live[0]) < Duration::from_secs(5));

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn health_classification() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();

    let fresh = WorkerRecord::new(std::process::id(), "Fresh");
    assert_eq!(reg.health(&fresh), Health::Ok);

    let mut stale = WorkerRecord::new(std::process::id(), "Stale");
    stale.last_heartbeat = epoch_secs() - 12 * 60;
    assert!(reg.is_frozen(&stale));
    assert_eq!(reg.health(&stale), Health::Frozen);

    let mut paused = WorkerRecord::new(std::process::id(), "Paused");
    paused.status = "[PAUSED] waiting for dawn".to_owned();
    paused.last_heartbeat = epoch_secs() - 12 * 60;
    assert_eq!(reg.health(&paused), Health::Paused);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn registry_sink_updates_through_the_session_trait() -> anyhow::Result<()> {
    use argosy_client::session::StatusSink;

    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();
    reg.register(WorkerRecord::new(std::process::id(), "Sunk"));

    let sink = RegistrySink::new(registry(), std::process::id());
    sink.update("leg 2 of 3");

    let live = registry().refresh();
    assert_eq!(live[0].status, "leg 2 of 3");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn corrupt_registry_file_reads_as_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let reg = registry();
    std::fs::write(reg.path(), "not json at all")?;
    assert!(reg.refresh().is_empty());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}
