// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lobby login pipeline: ten labeled phases from cached-token probe to
//! game-world handoff, producing everything a [`crate::session::GameSession`]
//! needs.
//!
//! Branching subphases (2FA, captcha) are expressed as sum-typed outcomes of
//! the credential phase; the orchestrator loop here pattern-matches and
//! re-enters the phase instead of unwinding through errors.

pub mod captcha;
pub mod device;
mod phases;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::cookie::Jar;

use crate::account::{Account, WorldId};
use crate::config::{Endpoints, Tunables};
use crate::error::LoginFailure;
use crate::prompt::Prompter;

use captcha::CaptchaSolver;
use phases::{AuthOutcome, Flow};

pub(crate) use phases::header_map;

/// Pool of desktop browser identities. One is pinned per account by an
/// email hash so the lobby sees a stable device.
const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/122.0.0.0 Safari/537.36",
];

/// Pin a user agent to an account by summing the email bytes.
pub fn user_agent_for(email: &str) -> &'static str {
    let index = email.bytes().map(usize::from).sum::<usize>() % USER_AGENTS.len();
    USER_AGENTS[index]
}

/// Everything the pipeline needs besides the account itself.
pub struct Context<'a> {
    pub endpoints: Endpoints,
    pub tunables: Tunables,
    /// Whether a human can answer prompts (2FA code, manual tokens).
    pub interactive: bool,
    pub prompter: &'a dyn Prompter,
    pub solver: &'a dyn CaptchaSolver,
    /// World to enter without asking. Falls back to the account's
    /// preference, then to a choice prompt (or the first world headless).
    pub preselected_world: Option<WorldId>,
}

/// Product of a successful login.
pub struct LoginResult {
    /// The authenticated HTTP client and its cookie jar.
    pub client: reqwest::Client,
    pub jar: Arc<Jar>,
    /// Cookies observed during the flow, by name. The session keeps
    /// harvesting on top of these for export/serialization.
    pub cookies: HashMap<String, String>,
    pub host: String,
    pub url_base: String,
    pub player: String,
    pub world: WorldId,
    pub character_id: String,
    pub world_name: String,
    /// HTML of the first game page; phase 10 validated it and the session
    /// seeds its token cache from it.
    pub initial_html: String,
    pub auth_token: String,
    pub device_token: String,
    /// Headers for subsequent game-server requests.
    pub game_headers: Vec<(String, String)>,
}

/// Run the login machine with whole-machine retries.
///
/// Vacation mode is terminal and returned immediately; any other failure is
/// retried up to `login_max_attempts` with a small delay.
pub async fn run(account: &Account, ctx: &Context<'_>) -> Result<LoginResult, LoginFailure> {
    let mut attempt = 0u32;
    loop {
        match run_once(account, ctx).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= ctx.tunables.login_max_attempts {
                    return Err(e);
                }
                tracing::warn!(attempt, err = %e, "login attempt failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(
                    ctx.tunables.login_retry_delay_secs,
                ))
                .await;
            }
        }
    }
}

async fn run_once(account: &Account, ctx: &Context<'_>) -> Result<LoginResult, LoginFailure> {
    let mut flow = Flow::start(account, ctx)?;

    // Phase 0: cached-token fast path. A live lobby token skips the whole
    // credential dance.
    let mut auth_token = String::new();
    if !account.cached_auth_token.is_empty() {
        if flow.probe_cached_token(&account.cached_auth_token).await {
            tracing::info!("cached lobby token accepted, skipping phases 1-7");
            auth_token = account.cached_auth_token.clone();
        } else {
            tracing::info!("cached lobby token rejected, running full flow");
            flow.reset_client()?;
        }
    }

    if auth_token.is_empty() {
        flow.resolve_device_token().await?;

        // Phase 1-4: environment ids, anti-bot handshake, fingerprint,
        // CORS preflight.
        flow.environment_ids().await?;
        flow.anti_bot_handshake().await?;
        flow.device_fingerprint().await;
        flow.cors_preflight().await?;

        // Phase 5/6: credentials with 2FA and captcha branches.
        let mut otp: Option<String> = None;
        let mut challenge: Option<String> = None;
        let mut captcha_attempts = 0u32;
        let auth_body = loop {
            match flow.authenticate(otp.as_deref(), challenge.as_deref()).await? {
                AuthOutcome::Accepted(body) => break body,
                AuthOutcome::NeedOtp => {
                    if !ctx.interactive {
                        return Err(LoginFailure::OtpUnavailable);
                    }
                    otp = Some(ctx.prompter.read_line("  Enter your 2FA code: "));
                }
                AuthOutcome::NeedCaptcha(challenge_id) => {
                    // One flat attempt budget covers the whole
                    // solve-and-resubmit cycle; a re-issued challenge does
                    // not refresh it.
                    let mut solved = false;
                    while captcha_attempts < ctx.tunables.captcha_max_attempts {
                        captcha_attempts += 1;
                        if flow.captcha_round(&challenge_id).await? {
                            solved = true;
                            break;
                        }
                    }
                    if !solved {
                        return Err(LoginFailure::CaptchaUnsolvable);
                    }
                    challenge = Some(challenge_id);
                }
                AuthOutcome::Failed(kind) => return Err(kind),
            }
        };

        // Phase 7: token extraction (manual fallback when interactive).
        auth_token = flow.extract_auth_token(&auth_body).await?;
    }
    flow.install_auth_cookie(&auth_token);

    // Phase 8: accounts and servers.
    let selection = flow.select_world(&auth_token).await?;

    // Phase 9 needs a device token even when the lobby token was cached.
    flow.resolve_device_token().await?;

    // Phase 9: game-world handoff.
    let host = ctx.endpoints.game_host(selection.world.number, &selection.world.language);
    let game_headers = game_headers(&host, flow.user_agent);
    let initial_html = flow.enter_world(&auth_token, &selection, &game_headers).await?;

    // Phase 10: validation.
    if crate::parse::is_vacation(&initial_html) {
        return Err(LoginFailure::Vacation);
    }
    if crate::parse::is_expired(&initial_html) {
        return Err(LoginFailure::rejected("game session expired immediately after handoff"));
    }

    let device_token = flow.device_token.clone();
    let url_base = ctx.endpoints.game_url_base(selection.world.number, &selection.world.language);
    Ok(LoginResult {
        client: flow.client,
        jar: flow.jar,
        cookies: flow.cookies,
        host,
        url_base,
        player: selection.player,
        world: selection.world,
        character_id: selection.character_id,
        world_name: selection.world_name,
        initial_html,
        auth_token,
        device_token,
        game_headers,
    })
}

/// Headers sent with every game-server request.
fn game_headers(host: &str, user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_owned(), user_agent.to_owned()),
        ("Accept".to_owned(), "*/*".to_owned()),
        ("Accept-Language".to_owned(), "en-US,en;q=0.5".to_owned()),
        ("Referer".to_owned(), format!("https://{host}")),
        ("X-Requested-With".to_owned(), "XMLHttpRequest".to_owned()),
        ("Origin".to_owned(), format!("https://{host}")),
        ("DNT".to_owned(), "1".to_owned()),
        ("Pragma".to_owned(), "no-cache".to_owned()),
        ("Cache-Control".to_owned(), "no-cache".to_owned()),
    ]
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
