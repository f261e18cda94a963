// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain serializable session record for cross-process handoff.
//!
//! The parent never shares memory with its workers; a freshly spawned worker
//! reconstructs a session from this record (written to a 0600 temp file) and
//! gets fresh mutexes, a fresh rate limiter, and an unstarted health pinger.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::account::{Account, ProxyConfig, WorldId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub host: String,
    pub url_base: String,
    pub player: String,
    pub world: WorldId,
    pub character_id: String,
    pub world_name: String,
    pub auth_token: String,
    pub device_token: String,
    pub game_headers: Vec<(String, String)>,
    pub cookies: HashMap<String, String>,
    pub proxy: Option<ProxyConfig>,
    pub proxy_active: bool,
    /// Full account record so the worker can re-login on expiry.
    pub account: Account,
    pub csrf_token: String,
    pub current_city_id: String,
}

impl SessionState {
    /// Write atomically (tmp + rename) with owner-only permissions.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load and immediately unlink — handoff files carry credentials and
    /// must not outlive the handoff.
    pub fn take(path: &Path) -> anyhow::Result<Self> {
        let state = Self::load(path)?;
        let _ = std::fs::remove_file(path);
        Ok(state)
    }
}
