// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification sink consumed by the supervisor and transport engine.
//!
//! Backends are out of scope; this is the whole contract: a message plus an
//! optional photo, delivered or not. Failures are reported but callers treat
//! notification as best-effort.

use std::path::Path;

use async_trait::async_trait;

#[async_trait]
pub trait Notify: Send + Sync {
    async fn send(&self, message: &str, photo: Option<&Path>) -> anyhow::Result<()>;
}

/// Sink that drops everything. Used when no backend is configured.
pub struct NullNotifier;

#[async_trait]
impl Notify for NullNotifier {
    async fn send(&self, message: &str, _photo: Option<&Path>) -> anyhow::Result<()> {
        tracing::debug!(message, "notification dropped (no backend configured)");
        Ok(())
    }
}

/// Plain HTTP push: the message goes as the request body to a fixed topic
/// URL, a photo goes as a second request with a filename header.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { url, client }
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn send(&self, message: &str, photo: Option<&Path>) -> anyhow::Result<()> {
        let resp = self.client.post(&self.url).body(message.to_owned()).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("notification endpoint returned {}", resp.status());
        }

        if let Some(path) = photo {
            let bytes = tokio::fs::read(path).await?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo".to_owned());
            let resp = self
                .client
                .put(&self.url)
                .header("Filename", filename)
                .body(bytes)
                .send()
                .await?;
            if !resp.status().is_success() {
                anyhow::bail!("photo upload returned {}", resp.status());
            }
        }
        Ok(())
    }
}
