// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process mutex over a ship class, backed by a lock file.
//!
//! Workers of the same account share one in-game fleet per ship class, so
//! transport batches must not interleave. Exclusive file creation is the
//! lock; the JSON payload identifies the holder so a crashed worker's lock
//! can be evicted once it looks stale.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::{path_component, state_dir, Tunables};
use crate::error::GameError;

/// The two separately counted and separately locked fleet classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipClass {
    Merchant,
    Freighter,
}

impl ShipClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant_ships",
            Self::Freighter => "freighters",
        }
    }

    /// Human label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant ships",
            Self::Freighter => "freighters",
        }
    }
}

impl std::fmt::Display for ShipClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holder record written into the lock file on acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockPayload {
    pub pid: u32,
    /// Epoch seconds at acquisition.
    pub acquired_at: u64,
    pub ship_class: ShipClass,
    pub account_key: String,
}

/// File-backed mutex keyed by `(account, ship class)`.
pub struct FleetLock {
    path: PathBuf,
    account_key: String,
    class: ShipClass,
    stale_threshold: Duration,
    poll_interval: Duration,
    held: bool,
}

impl FleetLock {
    /// Build the lock for one account's ship class. `world` and `user` are
    /// the same identity components the registry files use.
    pub fn new(world: &str, user: &str, class: ShipClass, tunables: &Tunables) -> Self {
        let filename = format!(
            ".argosy_shared_{}_{}_{}.lock",
            class.as_str(),
            path_component(world),
            path_component(user),
        );
        Self {
            path: state_dir().join(filename),
            account_key: format!("{}/{}", world, user),
            class,
            stale_threshold: Duration::from_secs(tunables.lock_stale_secs),
            poll_interval: Duration::from_secs(tunables.lock_poll_secs),
            held: false,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Acquire within `timeout`, evicting holders whose payload is older
    /// than the stale threshold. Failure is recoverable; callers retry at
    /// their own cadence.
    pub async fn acquire(&mut self, timeout: Duration) -> Result<(), GameError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&self.path) {
                Ok(file) => {
                    let payload = LockPayload {
                        pid: std::process::id(),
                        acquired_at: epoch_secs(),
                        ship_class: self.class,
                        account_key: self.account_key.clone(),
                    };
                    if let Err(e) = serde_json::to_writer(file, &payload) {
                        tracing::warn!(err = %e, "failed to write fleet lock payload");
                    }
                    self.held = true;
                    tracing::debug!(path = %self.path.display(), "fleet lock acquired");
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    self.evict_if_stale();
                }
                Err(e) => {
                    tracing::warn!(err = %e, path = %self.path.display(), "fleet lock open failed");
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(GameError::LockTimeout(timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Remove the lock file when its holder looks dead. An unreadable
    /// payload is treated as dead too (interrupted writer).
    fn evict_if_stale(&self) {
        let payload = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<LockPayload>(&raw).ok());

        match payload {
            Some(p) => {
                let age = epoch_secs().saturating_sub(p.acquired_at);
                if age > self.stale_threshold.as_secs() {
                    tracing::warn!(
                        pid = p.pid,
                        age_secs = age,
                        "evicting stale fleet lock holder"
                    );
                    let _ = std::fs::remove_file(&self.path);
                }
            }
            None => {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    /// Release only if the recorded PID is ours. On mismatch another
    /// process evicted us and re-acquired; their lock must survive.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;

        let payload = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<LockPayload>(&raw).ok());

        match payload {
            Some(p) if p.pid == std::process::id() => {
                let _ = std::fs::remove_file(&self.path);
                tracing::debug!(path = %self.path.display(), "fleet lock released");
            }
            Some(p) => {
                tracing::warn!(
                    holder_pid = p.pid,
                    "fleet lock no longer ours at release; leaving it"
                );
            }
            None => {}
        }
    }
}

impl Drop for FleetLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
