// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Captcha solving capability: two images in, an icon index out.
//!
//! The lobby's challenge shows a text instruction image and a strip of four
//! icons; the answer is the index of the icon that matches. Solvers are
//! chained: an external API first, a human at the terminal last.

use std::sync::Arc;

use async_trait::async_trait;

use crate::prompt::Prompter;

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Return the matching icon index in `[0, 3]`.
    async fn solve(&self, text_image: &[u8], icons_image: &[u8]) -> anyhow::Result<u8>;
}

/// POSTs both images to an external solving API.
pub struct ApiSolver {
    base: String,
    client: reqwest::Client,
}

impl ApiSolver {
    pub fn new(base: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(900))
            .build()
            .unwrap_or_default();
        Self { base, client }
    }
}

#[async_trait]
impl CaptchaSolver for ApiSolver {
    async fn solve(&self, text_image: &[u8], icons_image: &[u8]) -> anyhow::Result<u8> {
        let form = reqwest::multipart::Form::new()
            .part(
                "text_image",
                reqwest::multipart::Part::bytes(text_image.to_vec()).file_name("text_image"),
            )
            .part(
                "icons_image",
                reqwest::multipart::Part::bytes(icons_image.to_vec()).file_name("icons_image"),
            );

        let resp = self
            .client
            .post(format!("{}/v1/decaptcha/lobby", self.base))
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("captcha API returned {}", resp.status());
        }

        let answer: serde_json::Value = resp.json().await?;
        let Some(n) = answer.as_i64() else {
            anyhow::bail!("captcha API returned a non-integer: {answer}");
        };
        if !(0..=3).contains(&n) {
            anyhow::bail!("captcha API answer out of range: {n}");
        }
        Ok(n as u8)
    }
}

/// Asks the human at the terminal. Only useful interactively; the images
/// cannot be rendered, so the user is expected to have the lobby open.
pub struct PromptSolver {
    prompter: Arc<dyn Prompter>,
}

impl PromptSolver {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

#[async_trait]
impl CaptchaSolver for PromptSolver {
    async fn solve(&self, _text_image: &[u8], _icons_image: &[u8]) -> anyhow::Result<u8> {
        let choice = self.prompter.read_choice(
            "\n  A login captcha was presented. Open the lobby in a browser to see \
             the icons, then answer here (1-4): ",
            1,
            4,
        );
        Ok((choice - 1) as u8)
    }
}

/// Tries each solver in order, returning the first success.
pub struct SolverChain {
    solvers: Vec<Box<dyn CaptchaSolver>>,
}

impl SolverChain {
    pub fn new(solvers: Vec<Box<dyn CaptchaSolver>>) -> Self {
        Self { solvers }
    }

    /// The standard chain: API solver when configured, then the terminal
    /// prompt when interactive.
    pub fn standard(
        api_base: Option<&str>,
        interactive: bool,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let mut solvers: Vec<Box<dyn CaptchaSolver>> = Vec::new();
        if let Some(base) = api_base {
            solvers.push(Box::new(ApiSolver::new(base.to_owned())));
        }
        if interactive {
            solvers.push(Box::new(PromptSolver::new(prompter)));
        }
        Self::new(solvers)
    }
}

#[async_trait]
impl CaptchaSolver for SolverChain {
    async fn solve(&self, text_image: &[u8], icons_image: &[u8]) -> anyhow::Result<u8> {
        let mut last_err = None;
        for solver in &self.solvers {
            match solver.solve(text_image, icons_image).await {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    tracing::warn!(err = %e, "captcha solver failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no captcha solver configured")))
    }
}
