// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

#[test]
#[serial]
fn report_then_drain_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let mailbox = CriticalErrorMailbox::new("s59-en", "Zeno");
    mailbox.report("Transport Manager", "3 consecutive shipping failures");
    mailbox.report("Transport Manager", "gave up after restarts");

    let drained = mailbox.drain();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].module, "Transport Manager");
    assert_eq!(drained[0].pid, std::process::id());
    assert!(drained[1].message.contains("gave up"));

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn drain_empties_the_spool() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let mailbox = CriticalErrorMailbox::new("s59-en", "Zeno");
    mailbox.report("Mod", "boom");
    assert_eq!(mailbox.drain().len(), 1);
    assert!(mailbox.drain().is_empty());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn drain_without_spool_is_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let mailbox = CriticalErrorMailbox::new("s59-en", "Zeno");
    assert!(mailbox.drain().is_empty());

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn reports_after_a_drain_start_a_fresh_spool() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let mailbox = CriticalErrorMailbox::new("s59-en", "Zeno");
    mailbox.report("A", "first");
    mailbox.drain();
    mailbox.report("B", "second");

    let drained = mailbox.drain();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].module, "B");

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}
