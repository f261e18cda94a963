// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Critical-error spool between workers and the parent menu.
//!
//! Workers append fatal errors; the parent drains the file before every
//! menu render and shows what it finds. Draining moves the file aside
//! first so a worker appending concurrently starts a fresh spool instead
//! of racing the reader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths;
use crate::registry::epoch_secs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalError {
    pub pid: u32,
    pub module: String,
    pub message: String,
    /// Epoch seconds.
    pub timestamp: u64,
}

pub struct CriticalErrorMailbox {
    path: PathBuf,
}

impl CriticalErrorMailbox {
    pub fn new(world: &str, user: &str) -> Self {
        Self { path: paths::errors_file(world, user) }
    }

    /// Append one error (read-modify-write via temp file).
    pub fn report(&self, module: &str, message: &str) {
        let mut errors = self.read(&self.path);
        errors.push(CriticalError {
            pid: std::process::id(),
            module: module.to_owned(),
            message: message.to_owned(),
            timestamp: epoch_secs(),
        });

        let Ok(json) = serde_json::to_string_pretty(&errors) else {
            return;
        };
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path))
        {
            tracing::warn!(err = %e, "could not spool critical error");
        }
    }

    /// Move the spool aside, read it, and delete it. Returns everything
    /// reported since the last drain.
    pub fn drain(&self) -> Vec<CriticalError> {
        let aside = self.path.with_extension("draining");
        if std::fs::rename(&self.path, &aside).is_err() {
            return Vec::new();
        }
        let errors = self.read(&aside);
        let _ = std::fs::remove_file(&aside);
        errors
    }

    fn read(&self, path: &std::path::Path) -> Vec<CriticalError> {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Vec::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
