// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup for the parent shell and for detached workers.
//!
//! The parent logs to stderr so the menu stays readable on stdout. A
//! worker logs to its own file from process start — its prompts go through
//! the terminal directly, and after the background gate nothing it prints
//! may reach the parent's screen.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::paths;

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Parent-process logging to stderr.
pub fn init_parent(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(&config.log_level))
        .with_writer(std::io::stderr);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Worker-process logging to a per-PID file.
pub fn init_worker(config: &Config) -> anyhow::Result<()> {
    let path = paths::worker_log_file(std::process::id());
    let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(&config.log_level))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file));
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
