// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account and world identity records shared by the login flow, the game
//! session, and the encrypted store in the CLI.

use serde::{Deserialize, Serialize};

/// One game world: `s{number}-{language}` in URLs and menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldId {
    pub number: u32,
    pub language: String,
}

impl WorldId {
    pub fn new(number: u32, language: impl Into<String>) -> Self {
        Self { number, language: language.into() }
    }

    /// Parse the `s59-en` form. Returns `None` on anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix('s')?;
        let (num, lang) = rest.split_once('-')?;
        if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self { number: num.parse().ok()?, language: lang.to_owned() })
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}-{}", self.number, self.language)
    }
}

/// Proxy settings for a single account. The proxy is only activated after
/// login — the lobby runs proxy detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl ProxyConfig {
    /// Proxy URL for the HTTP client. SOCKS hosts get `socks5h` so DNS
    /// resolves on the proxy side.
    pub fn url(&self) -> String {
        let scheme = if self.host.to_lowercase().contains("socks") { "socks5h" } else { "http" };
        if self.username.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}@{}:{}", scheme, self.username, self.password, self.host, self.port)
        }
    }
}

/// A stored account. Lives encrypted on disk; the decrypted copy is held for
/// the lifetime of one parent process and its workers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub secret: String,
    #[serde(default)]
    pub known_worlds: Vec<WorldId>,
    #[serde(default)]
    pub default_world: Option<WorldId>,
    /// Lobby bearer token from the last successful login, if still cached.
    #[serde(default)]
    pub cached_auth_token: String,
    /// Device fingerprint token from the last successful login.
    #[serde(default)]
    pub cached_device_token: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// Auto-activate the proxy after login.
    #[serde(default)]
    pub proxy_auto: bool,
    /// Backend preferences owned by the notification collaborators.
    #[serde(default)]
    pub notification_prefs: serde_json::Value,
}

impl Account {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { email: email.into(), secret: secret.into(), ..Self::default() }
    }

    /// The world to log into without asking: the default if set, otherwise
    /// the first known world.
    pub fn preferred_world(&self) -> Option<&WorldId> {
        self.default_world.as_ref().or_else(|| self.known_worlds.first())
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
