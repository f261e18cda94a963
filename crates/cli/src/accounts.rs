// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encrypted account store.
//!
//! All accounts live as one JSON list inside a single encrypted file (see
//! `crypto.rs` for the blob layout). Saves are atomic and owner-only.

use std::path::{Path, PathBuf};

use argosy_client::account::Account;

use crate::crypto;

/// Fixed path a container secret may be mounted at.
const SECRET_FILE: &str = "/run/secrets/argosy_key";

/// Environment variable fallback for the passphrase.
const PASSPHRASE_ENV: &str = "ARGOSY_MASTER_KEY";

/// Try the non-interactive passphrase sources, in priority order:
/// container secret file, then environment variable. `None` means the
/// caller should prompt.
pub fn passphrase_from_environment() -> Option<String> {
    if let Ok(contents) = std::fs::read_to_string(SECRET_FILE) {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_owned());
        }
    }
    std::env::var(PASSPHRASE_ENV).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data-dir>/accounts.enc`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::at(data_dir.join("accounts.enc"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.metadata().map(|m| m.len() > 0).unwrap_or(false)
    }

    /// Decrypt and deserialize the account list. A missing file is an
    /// empty list, not an error.
    pub fn load(&self, passphrase: &str) -> anyhow::Result<Vec<Account>> {
        if !self.exists() {
            tracing::info!("no account store yet, starting empty");
            return Ok(Vec::new());
        }
        let blob = std::fs::read(&self.path)?;
        let plain = crypto::decrypt(&blob, passphrase)?;
        let accounts: Vec<Account> = serde_json::from_slice(&plain)?;
        tracing::info!(count = accounts.len(), "account store loaded");
        Ok(accounts)
    }

    /// Encrypt and write the account list atomically with 0600 perms.
    pub fn save(&self, accounts: &[Account], passphrase: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let plain = serde_json::to_vec(accounts)?;
        let blob = crypto::encrypt(&plain, passphrase)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, blob)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;
        tracing::info!(count = accounts.len(), "account store saved");
        Ok(())
    }
}

/// One display line per account, without secrets.
pub fn summaries(accounts: &[Account]) -> Vec<String> {
    accounts
        .iter()
        .map(|a| {
            let worlds: Vec<String> = a.known_worlds.iter().map(ToString::to_string).collect();
            let proxy = if a.proxy.is_some() { " [PROXY]" } else { "" };
            format!("{} ({}){}", a.email, worlds.join(", "), proxy)
        })
        .collect()
}

#[cfg(test)]
#[path = "accounts_tests.rs"]
mod tests;
