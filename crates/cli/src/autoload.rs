// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Saved module configurations and the startup auto-launch policy.
//!
//! A recording session captures a module's config answers; the entry saved
//! here replays them into a fresh worker after login. The launch policy is
//! deliberately conservative about frozen workers: it spawns a replacement
//! and warns, but never kills — that stays a user action on the task
//! status screen.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths;
use crate::registry::{epoch_secs, ProcessRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLoadEntry {
    pub id: String,
    pub module_name: String,
    pub module_number: u16,
    pub enabled: bool,
    pub recorded_inputs: Vec<String>,
    pub description: String,
    /// Epoch seconds.
    pub created_at: u64,
    pub last_launched: Option<u64>,
    pub launch_count: u32,
}

impl AutoLoadEntry {
    pub fn new(
        module_name: impl Into<String>,
        module_number: u16,
        recorded_inputs: Vec<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            module_name: module_name.into(),
            module_number,
            enabled: true,
            recorded_inputs,
            description: description.into(),
            created_at: epoch_secs(),
            last_launched: None,
            launch_count: 0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AutoLoadDoc {
    version: u32,
    configs: Vec<AutoLoadEntry>,
}

/// What `launch_enabled` did, for display and for tests.
#[derive(Debug, Default)]
pub struct LaunchReport {
    /// `(module_name, pid)` of freshly spawned workers.
    pub launched: Vec<(String, u32)>,
    /// Enabled entries skipped because a healthy worker already runs.
    pub skipped_running: Vec<String>,
    /// `(module_name, stale_pids)` of apparently frozen workers that were
    /// replaced but not killed.
    pub frozen_warned: Vec<(String, Vec<u32>)>,
    /// Entries whose spawn failed.
    pub failed: Vec<String>,
}

pub struct AutoLoaderStore {
    path: PathBuf,
}

impl AutoLoaderStore {
    pub fn new(world: &str, user: &str) -> Self {
        Self { path: paths::autoload_file(world, user) }
    }

    pub fn load(&self) -> Vec<AutoLoadEntry> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str::<AutoLoadDoc>(&contents).map(|d| d.configs).unwrap_or_default()
    }

    pub fn save(&self, configs: &[AutoLoadEntry]) {
        let doc = AutoLoadDoc { version: 1, configs: configs.to_vec() };
        let Ok(json) = serde_json::to_string_pretty(&doc) else {
            return;
        };
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path))
        {
            tracing::warn!(err = %e, "could not save autoload configs");
        }
    }

    pub fn add(&self, entry: AutoLoadEntry) {
        let mut configs = self.load();
        configs.push(entry);
        self.save(&configs);
    }

    /// Flip one entry. Returns the new enabled state.
    pub fn toggle(&self, index: usize) -> Option<bool> {
        let mut configs = self.load();
        let entry = configs.get_mut(index)?;
        entry.enabled = !entry.enabled;
        let now_enabled = entry.enabled;
        self.save(&configs);
        Some(now_enabled)
    }

    pub fn remove(&self, index: usize) -> Option<AutoLoadEntry> {
        let mut configs = self.load();
        if index >= configs.len() {
            return None;
        }
        let removed = configs.remove(index);
        self.save(&configs);
        Some(removed)
    }

    pub fn find_by_module(&self, module_name: &str) -> Option<AutoLoadEntry> {
        self.load().into_iter().find(|e| e.module_name == module_name)
    }

    /// Launch every enabled entry that has no healthy worker running.
    ///
    /// `spawn` receives the entry and returns the new worker's PID; it is
    /// injected so the policy can be exercised without real processes.
    pub fn launch_enabled(
        &self,
        registry: &ProcessRegistry,
        mut spawn: impl FnMut(&AutoLoadEntry) -> anyhow::Result<u32>,
    ) -> LaunchReport {
        let mut report = LaunchReport::default();
        let mut configs = self.load();
        if configs.is_empty() {
            return report;
        }

        let workers = registry.refresh();
        let mut touched = false;

        for entry in configs.iter_mut().filter(|e| e.enabled) {
            let (healthy, frozen): (Vec<_>, Vec<_>) = workers
                .iter()
                .filter(|w| w.label == entry.module_name)
                .partition(|w| !registry.is_frozen(w));

            if !healthy.is_empty() {
                tracing::info!(module = %entry.module_name, "already running, skipping");
                report.skipped_running.push(entry.module_name.clone());
                continue;
            }

            if !frozen.is_empty() {
                let pids: Vec<u32> = frozen.iter().map(|w| w.pid).collect();
                tracing::warn!(
                    module = %entry.module_name,
                    ?pids,
                    "worker looks frozen (no heartbeat), launching a replacement"
                );
                report.frozen_warned.push((entry.module_name.clone(), pids));
            }

            match spawn(entry) {
                Ok(pid) => {
                    entry.last_launched = Some(epoch_secs());
                    entry.launch_count += 1;
                    touched = true;
                    report.launched.push((entry.module_name.clone(), pid));
                }
                Err(e) => {
                    tracing::warn!(module = %entry.module_name, err = %e, "auto-launch failed");
                    report.failed.push(entry.module_name.clone());
                }
            }
        }

        if touched {
            self.save(&configs);
        }
        report
    }
}

#[cfg(test)]
#[path = "autoload_tests.rs"]
mod tests;
