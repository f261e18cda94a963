// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for workspace-level spec tests.
//!
//! Provides the path to the compiled `argosy` binary and an isolated state
//! directory guard, so specs can exercise the real worker entry point and
//! the file-backed coordination between processes.

use std::path::{Path, PathBuf};

/// Resolve the compiled `argosy` binary.
pub fn argosy_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("argosy")
}

/// Temp state directory applied via `ARGOSY_STATE_DIR` for the guard's
/// lifetime. Use together with `#[serial]` — the variable is process-wide.
pub struct StateDir {
    dir: tempfile::TempDir,
}

impl StateDir {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        std::env::set_var("ARGOSY_STATE_DIR", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for StateDir {
    fn drop(&mut self) {
        std::env::remove_var("ARGOSY_STATE_DIR");
    }
}
