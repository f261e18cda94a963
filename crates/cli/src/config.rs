// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use argosy_client::config::Endpoints;
use argosy_client::notify::{Notify, NullNotifier, WebhookNotifier};

/// Autonomous trade-fleet agent for a browser strategy game.
#[derive(Debug, Parser)]
#[command(name = "argosy", version, about)]
pub struct Config {
    /// Directory holding the encrypted account store.
    #[arg(long, env = "ARGOSY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log format (text or json).
    #[arg(long, env = "ARGOSY_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "ARGOSY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Push-notification endpoint (plain POST). Unset disables pushes.
    #[arg(long, env = "ARGOSY_NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// External captcha/device-token API base.
    #[arg(long, env = "ARGOSY_SOLVER_API")]
    pub solver_api: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("--log-format must be 'text' or 'json'");
        }
        Ok(())
    }

    /// Where `accounts.enc` lives.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("argosy")
    }

    /// Endpoint bases, with the solver API override applied.
    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::default();
        if self.solver_api.is_some() {
            endpoints.solver_api = self.solver_api.clone();
        }
        endpoints
    }

    pub fn notifier(&self) -> Arc<dyn Notify> {
        match &self.notify_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(NullNotifier),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
