// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

#[test]
#[serial]
fn files_land_in_the_state_dir_with_sanitized_names() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let registry = registry_file("s59-en", "Ze/no");
    assert_eq!(registry.parent(), Some(dir.path()));
    assert_eq!(
        registry.file_name().and_then(|n| n.to_str()),
        Some(".argosy_processes_s59-en_Ze_no.json")
    );
    assert_eq!(
        errors_file("s59-en", "Zeno").file_name().and_then(|n| n.to_str()),
        Some(".argosy_errors_s59-en_Zeno.json")
    );
    assert_eq!(
        autoload_file("s59-en", "Zeno").file_name().and_then(|n| n.to_str()),
        Some(".argosy_autoload_s59-en_Zeno.json")
    );

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}

#[test]
#[serial]
fn handoff_files_are_tagged() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("ARGOSY_STATE_DIR", dir.path());

    let session = session_handoff_file("abc-123");
    let marker = handoff_marker_file("abc-123");
    assert!(session.to_string_lossy().contains("abc-123"));
    assert!(marker.to_string_lossy().contains("abc-123"));
    assert_ne!(session, marker);

    std::env::remove_var("ARGOSY_STATE_DIR");
    Ok(())
}
