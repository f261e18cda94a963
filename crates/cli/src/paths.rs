// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-account state file locations.
//!
//! Everything the parent and its workers share goes through files in the
//! state directory (the home directory unless `ARGOSY_STATE_DIR`
//! overrides it, which tests do). World and user components are sanitized
//! before they land in a filename.

use std::path::PathBuf;

use argosy_client::config::{path_component, state_dir};

/// Process registry for one account on one world.
pub fn registry_file(world: &str, user: &str) -> PathBuf {
    dot_file("processes", world, user)
}

/// Critical-error spool for one account.
pub fn errors_file(world: &str, user: &str) -> PathBuf {
    dot_file("errors", world, user)
}

/// Saved auto-load configurations for one account.
pub fn autoload_file(world: &str, user: &str) -> PathBuf {
    dot_file("autoload", world, user)
}

/// Recorded-inputs handoff, written by a recording worker and read back by
/// the parent. One per machine; recordings are serialized by the dispatch
/// flow.
pub fn recorded_inputs_file() -> PathBuf {
    state_dir().join(".argosy_recorded_inputs.json")
}

/// Serialized session handed to a freshly spawned worker.
pub fn session_handoff_file(tag: &str) -> PathBuf {
    state_dir().join(format!(".argosy_session_{}.json", path_component(tag)))
}

/// Marker a worker creates when its config phase is done and it has
/// detached; the parent polls for it.
pub fn handoff_marker_file(tag: &str) -> PathBuf {
    state_dir().join(format!(".argosy_handoff_{}", path_component(tag)))
}

/// Replay-inputs file passed to a worker being auto-restarted.
pub fn replay_inputs_file(tag: &str) -> PathBuf {
    state_dir().join(format!(".argosy_inputs_{}.json", path_component(tag)))
}

/// Per-worker log file.
pub fn worker_log_file(pid: u32) -> PathBuf {
    state_dir().join(format!(".argosy_worker_{pid}.log"))
}

fn dot_file(kind: &str, world: &str, user: &str) -> PathBuf {
    state_dir().join(format!(
        ".argosy_{}_{}_{}.json",
        kind,
        path_component(world),
        path_component(user)
    ))
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
