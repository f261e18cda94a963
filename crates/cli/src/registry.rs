// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-account registry of live background workers.
//!
//! One JSON document per account, rewritten read-modify-write with a temp
//! file rename. The file is authoritative: workers append themselves and
//! heartbeat through status updates; the parent reads it to render health
//! and prunes entries whose PID is gone or belongs to someone else's
//! process (PID reuse).

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::paths;

/// Status prefix a module sets while deliberately idle; rendered as its own
/// health state instead of frozen.
const PAUSED_MARKER: &str = "[PAUSED]";

/// Heartbeats older than this mark a worker as frozen.
pub const FROZEN_THRESHOLD: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub pid: u32,
    /// Human label, e.g. "Transport Manager".
    pub label: String,
    /// Epoch seconds at detach.
    pub started_at: u64,
    pub status: String,
    /// Epoch seconds of the last status update.
    pub last_heartbeat: u64,
}

impl WorkerRecord {
    pub fn new(pid: u32, label: impl Into<String>) -> Self {
        let now = epoch_secs();
        Self {
            pid,
            label: label.into(),
            started_at: now,
            status: "starting".to_owned(),
            last_heartbeat: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    /// Heartbeat older than the frozen threshold.
    Frozen,
    /// Worker marked itself paused.
    Paused,
}

pub struct ProcessRegistry {
    path: PathBuf,
    frozen_threshold: Duration,
}

impl ProcessRegistry {
    pub fn new(world: &str, user: &str, frozen_threshold: Duration) -> Self {
        Self { path: paths::registry_file(world, user), frozen_threshold }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read, drop dead entries, rewrite, and return the live list.
    ///
    /// An entry survives when its PID is alive and the process carries the
    /// same executable name as ours; if the name cannot be read the entry
    /// is kept (better a stale row than a reaped live worker).
    pub fn refresh(&self) -> Vec<WorkerRecord> {
        let ours = own_comm();
        let mut live: Vec<WorkerRecord> = self
            .read()
            .into_iter()
            .filter(|entry| {
                if !process_alive(entry.pid) {
                    return false;
                }
                match (process_comm(entry.pid), &ours) {
                    (Some(theirs), Some(ours)) => &theirs == ours,
                    _ => true,
                }
            })
            .collect();

        // One row per PID.
        live.sort_by_key(|e| e.pid);
        live.dedup_by_key(|e| e.pid);

        self.write(&live);
        live
    }

    /// Add a worker row. Idempotent per PID.
    pub fn register(&self, record: WorkerRecord) {
        let mut entries = self.read();
        entries.retain(|e| e.pid != record.pid);
        entries.push(record);
        self.write(&entries);
    }

    /// Rewrite the status and heartbeat of one worker's row.
    pub fn update_status(&self, pid: u32, status: &str) {
        let mut entries = self.read();
        let mut touched = false;
        for entry in &mut entries {
            if entry.pid == pid {
                entry.status = status.to_owned();
                entry.last_heartbeat = epoch_secs();
                touched = true;
            }
        }
        if touched {
            self.write(&entries);
        }
    }

    pub fn heartbeat_age(&self, entry: &WorkerRecord) -> Duration {
        Duration::from_secs(epoch_secs().saturating_sub(entry.last_heartbeat))
    }

    pub fn is_frozen(&self, entry: &WorkerRecord) -> bool {
        self.heartbeat_age(entry) > self.frozen_threshold
    }

    pub fn health(&self, entry: &WorkerRecord) -> Health {
        if entry.status.contains(PAUSED_MARKER) {
            Health::Paused
        } else if self.is_frozen(entry) {
            Health::Frozen
        } else {
            Health::Ok
        }
    }

    fn read(&self) -> Vec<WorkerRecord> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn write(&self, entries: &[WorkerRecord]) {
        let Ok(json) = serde_json::to_string_pretty(entries) else {
            return;
        };
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path))
        {
            tracing::warn!(err = %e, path = %self.path.display(), "could not write registry");
        }
    }
}

/// Status sink wired into a worker's session: every status update lands in
/// the registry row and refreshes the heartbeat.
pub struct RegistrySink {
    registry: ProcessRegistry,
    pid: u32,
}

impl RegistrySink {
    pub fn new(registry: ProcessRegistry, pid: u32) -> Self {
        Self { registry, pid }
    }
}

impl argosy_client::session::StatusSink for RegistrySink {
    fn update(&self, status: &str) {
        self.registry.update_status(self.pid, status);
    }
}

/// Is there a live process with this PID (signal 0 probe)?
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

/// The executable name of a process, for PID-reuse detection.
#[cfg(target_os = "linux")]
fn process_comm(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{pid}/comm")).ok().map(|s| s.trim().to_owned())
}

#[cfg(not(target_os = "linux"))]
fn process_comm(_pid: u32) -> Option<String> {
    None
}

fn own_comm() -> Option<String> {
    process_comm(std::process::id())
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
