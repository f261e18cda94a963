// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-token resolver chain.
//!
//! The lobby wants a device fingerprint string (`tra:` prefix) with the
//! credential submission and the world handoff. Resolution order: the
//! token cached on the account, an external generator API, a manual paste.

use crate::error::LoginFailure;
use crate::prompt::Prompter;

/// Structural check: `tra:` prefix and a body mixing upper, lower, digits.
pub fn looks_valid(token: &str) -> bool {
    let Some(body) = token.strip_prefix("tra:") else {
        return false;
    };
    if body.len() < 10 {
        return false;
    }
    body.chars().any(|c| c.is_ascii_uppercase())
        && body.chars().any(|c| c.is_ascii_lowercase())
        && body.chars().any(|c| c.is_ascii_digit())
}

/// Obtain a device token through the resolver chain.
pub async fn obtain(
    client: &reqwest::Client,
    api_base: Option<&str>,
    user_agent: &str,
    stored: &str,
    interactive: bool,
    prompter: &dyn Prompter,
) -> Result<String, LoginFailure> {
    if looks_valid(stored) {
        tracing::debug!("using cached device token");
        return Ok(stored.to_owned());
    }
    if !stored.is_empty() {
        tracing::warn!("cached device token failed validation, regenerating");
    }

    if let Some(base) = api_base {
        match fetch_from_api(client, base, user_agent).await {
            Ok(token) => return Ok(token),
            Err(e) => tracing::warn!(err = %e, "device token API failed"),
        }
    }

    if interactive {
        let token = prompter.read_line(
            "  Automatic device-token generation failed. Paste a blackbox token \
             captured from a browser login (starts with tra:): ",
        );
        if !token.is_empty() {
            let token =
                if token.starts_with("tra:") { token } else { format!("tra:{token}") };
            if !looks_valid(&token) {
                tracing::warn!("manually entered device token failed validation, using anyway");
            }
            return Ok(token);
        }
    }

    Err(LoginFailure::rejected("no device token could be obtained"))
}

/// `GET {base}/v1/token?user_agent=...` returns the token body as a JSON
/// string, which gets the `tra:` prefix here.
async fn fetch_from_api(
    client: &reqwest::Client,
    base: &str,
    user_agent: &str,
) -> anyhow::Result<String> {
    let resp = client
        .get(format!("{base}/v1/token"))
        .query(&[("user_agent", user_agent)])
        .send()
        .await?;
    if !resp.status().is_success() {
        anyhow::bail!("token API returned {}", resp.status());
    }

    let body: serde_json::Value = resp.json().await?;
    if body.get("status").and_then(|v| v.as_str()) == Some("error") {
        anyhow::bail!(
            "token API error: {}",
            body.get("message").and_then(|v| v.as_str()).unwrap_or("unknown")
        );
    }

    let token = match &body {
        serde_json::Value::String(s) => format!("tra:{s}"),
        other => format!("tra:{other}"),
    };
    if !looks_valid(&token) {
        anyhow::bail!("token API returned an invalid token structure");
    }
    Ok(token)
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
