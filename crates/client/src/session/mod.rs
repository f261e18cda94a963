// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The long-lived authenticated game session.
//!
//! Owns the HTTP client and cookie jar, the action-request token cache, the
//! rate limiter, the request ring, and (once started) the health pinger.
//! Every game request funnels through [`GameSession::get_with`] /
//! [`GameSession::post_with`] in `http.rs`, which handle maintenance
//! windows, transient network failures, session expiry, and stale tokens
//! locally.

mod health;
mod http;
mod state;

pub use http::{GameResponse, Params, RequestOpts};
pub use state::SessionState;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use reqwest::cookie::Jar;
use reqwest::header::SET_COOKIE;
use tokio_util::sync::CancellationToken;

use crate::account::{Account, ProxyConfig, WorldId};
use crate::config::{Endpoints, Tunables, SESSION_COOKIE_NAMES};
use crate::error::{GameError, LoginFailure};
use crate::history::RequestRing;
use crate::login::{self, captcha::CaptchaSolver, LoginResult};
use crate::prompt::Prompter;
use crate::ratelimit::RateLimiter;
use crate::tokens::TokenCache;

/// How many requests the diagnostic ring remembers.
const HISTORY_CAPACITY: usize = 5;

/// Where a worker's status lines go besides the log: the process registry,
/// wired in by the CLI. Updating refreshes the heartbeat.
pub trait StatusSink: Send + Sync {
    fn update(&self, status: &str);
}

/// Capabilities the session needs but does not own.
pub struct SessionDeps {
    pub endpoints: Endpoints,
    pub tunables: Tunables,
    pub prompter: Arc<dyn Prompter>,
    pub solver: Arc<dyn CaptchaSolver>,
}

struct HttpState {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

pub struct GameSession {
    http: RwLock<HttpState>,
    pub host: String,
    pub url_base: String,
    pub player: String,
    pub world: WorldId,
    pub character_id: String,
    pub world_name: String,
    game_headers: Vec<(String, String)>,
    is_parent: bool,
    account: Mutex<Account>,
    tokens: TokenCache,
    limiter: RateLimiter,
    history: Mutex<RequestRing>,
    cookies: Mutex<HashMap<String, String>>,
    proxy: Mutex<Option<ProxyConfig>>,
    proxy_active: Mutex<bool>,
    status: Mutex<String>,
    status_sink: Mutex<Option<Arc<dyn StatusSink>>>,
    endpoints: Endpoints,
    tunables: Tunables,
    prompter: Arc<dyn Prompter>,
    solver: Arc<dyn CaptchaSolver>,
    health_stop: Mutex<Option<CancellationToken>>,
}

impl GameSession {
    /// Build the parent-process session from a completed login.
    pub fn from_login(result: LoginResult, account: Account, deps: SessionDeps) -> Arc<Self> {
        let tokens = TokenCache::new();
        tokens.try_extract(&result.initial_html);

        let mut stored = account;
        stored.cached_auth_token = result.auth_token.clone();
        stored.cached_device_token = result.device_token.clone();
        let proxy = stored.proxy.clone();
        let proxy_auto = stored.proxy_auto;

        let session = Arc::new(Self {
            http: RwLock::new(HttpState { client: result.client, jar: result.jar }),
            host: result.host,
            url_base: result.url_base,
            player: result.player,
            world: result.world,
            character_id: result.character_id,
            world_name: result.world_name,
            game_headers: result.game_headers,
            is_parent: true,
            account: Mutex::new(stored),
            tokens,
            limiter: RateLimiter::new(deps.tunables.min_request_interval()),
            history: Mutex::new(RequestRing::new(HISTORY_CAPACITY)),
            cookies: Mutex::new(result.cookies),
            proxy: Mutex::new(proxy),
            proxy_active: Mutex::new(false),
            status: Mutex::new(String::new()),
            status_sink: Mutex::new(None),
            endpoints: deps.endpoints,
            tunables: deps.tunables,
            prompter: deps.prompter,
            solver: deps.solver,
            health_stop: Mutex::new(None),
        });

        if proxy_auto {
            if let Err(e) = session.activate_proxy() {
                tracing::warn!(err = %e, "could not auto-activate proxy");
            }
        }

        tracing::info!(
            player = %session.player,
            world = %session.world,
            world_name = %session.world_name,
            "session established"
        );
        session
    }

    /// Reconstruct a session in a worker from a serialized record.
    ///
    /// Fresh client, fresh mutexes, fresh rate limiter; marked non-parent;
    /// health pinger not started.
    pub fn restore(state: SessionState, deps: SessionDeps) -> Result<Arc<Self>, GameError> {
        let jar = Arc::new(Jar::default());
        seed_jar(&jar, &state.cookies, &state.url_base, &deps.endpoints.lobby);

        let proxy = if state.proxy_active { state.proxy.as_ref() } else { None };
        let client = build_game_client(Arc::clone(&jar), proxy)?;

        let tokens = TokenCache::new();
        tokens.seed(&state.csrf_token, &state.current_city_id);

        tracing::info!(player = %state.player, world = %state.world, "session restored in worker");
        Ok(Arc::new(Self {
            http: RwLock::new(HttpState { client, jar }),
            host: state.host,
            url_base: state.url_base,
            player: state.player,
            world: state.world,
            character_id: state.character_id,
            world_name: state.world_name,
            game_headers: state.game_headers,
            is_parent: false,
            account: Mutex::new(state.account),
            tokens,
            limiter: RateLimiter::new(deps.tunables.min_request_interval()),
            history: Mutex::new(RequestRing::new(HISTORY_CAPACITY)),
            cookies: Mutex::new(state.cookies),
            proxy: Mutex::new(state.proxy),
            proxy_active: Mutex::new(state.proxy_active),
            status: Mutex::new(String::new()),
            status_sink: Mutex::new(None),
            endpoints: deps.endpoints,
            tunables: deps.tunables,
            prompter: deps.prompter,
            solver: deps.solver,
            health_stop: Mutex::new(None),
        }))
    }

    /// Serialize everything a worker needs to rebuild this session.
    pub fn serialize(&self) -> SessionState {
        SessionState {
            host: self.host.clone(),
            url_base: self.url_base.clone(),
            player: self.player.clone(),
            world: self.world.clone(),
            character_id: self.character_id.clone(),
            world_name: self.world_name.clone(),
            auth_token: self.account.lock().cached_auth_token.clone(),
            device_token: self.account.lock().cached_device_token.clone(),
            game_headers: self.game_headers.clone(),
            cookies: self.cookies.lock().clone(),
            proxy: self.proxy.lock().clone(),
            proxy_active: *self.proxy_active.lock(),
            account: self.account.lock().clone(),
            csrf_token: self.tokens.csrf().unwrap_or_default(),
            current_city_id: self.tokens.current_city().unwrap_or_default(),
        }
    }

    pub fn is_parent(&self) -> bool {
        self.is_parent
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub(crate) fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub(crate) fn game_headers(&self) -> &[(String, String)] {
        &self.game_headers
    }

    pub(crate) fn client(&self) -> reqwest::Client {
        self.http.read().client.clone()
    }

    pub(crate) fn push_history(&self, record: crate::history::RequestRecord) {
        self.history.lock().push(record);
    }

    pub(crate) fn complete_history(&self, status: u16, elapsed: std::time::Duration) {
        self.history.lock().complete_last(status, elapsed);
    }

    /// Oldest-first copy of the request diagnostics ring.
    pub fn request_history(&self) -> Vec<crate::history::RequestRecord> {
        self.history.lock().snapshot()
    }

    /// Record `Set-Cookie` values so the cookie set can be serialized.
    pub(crate) fn harvest_cookies(&self, response: &reqwest::Response) {
        let mut cookies = self.cookies.lock();
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            if let Some((name, val)) = pair.split_once('=') {
                cookies.insert(name.trim().to_owned(), val.trim().to_owned());
            }
        }
    }

    // ── Status ──────────────────────────────────────────────────────────

    /// Update the visible status. In workers this also refreshes the
    /// process-registry heartbeat through the installed sink.
    pub fn set_status(&self, status: &str) {
        *self.status.lock() = status.to_owned();
        tracing::info!(status, "status");
        if !self.is_parent {
            if let Some(sink) = self.status_sink.lock().clone() {
                sink.update(status);
            }
        }
    }

    pub fn status(&self) -> String {
        self.status.lock().clone()
    }

    pub fn set_status_sink(&self, sink: Arc<dyn StatusSink>) {
        *self.status_sink.lock() = Some(sink);
    }

    /// Sleep in heartbeat-sized chunks so long waits don't read as frozen.
    pub async fn sleep_with_heartbeat(&self, duration: std::time::Duration) {
        let chunk = std::time::Duration::from_secs(self.tunables.heartbeat_refresh_secs.max(1));
        let mut remaining = duration;
        while !remaining.is_zero() {
            let step = remaining.min(chunk);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
            if !remaining.is_zero() {
                let current = self.status();
                self.set_status(&current);
            }
        }
    }

    // ── Proxy ───────────────────────────────────────────────────────────

    /// Activate the account's proxy. Only called after login; the lobby
    /// runs proxy detection so login traffic stays direct.
    pub fn activate_proxy(&self) -> Result<(), GameError> {
        let Some(proxy) = self.proxy.lock().clone() else {
            return Ok(());
        };
        let jar = Arc::clone(&self.http.read().jar);
        let client = build_game_client(jar, Some(&proxy))?;
        self.http.write().client = client;
        *self.proxy_active.lock() = true;
        tracing::info!(host = %proxy.host, port = proxy.port, "proxy activated");
        Ok(())
    }

    pub fn deactivate_proxy(&self) -> Result<(), GameError> {
        let jar = Arc::clone(&self.http.read().jar);
        let client = build_game_client(jar, None)?;
        self.http.write().client = client;
        *self.proxy_active.lock() = false;
        tracing::info!("proxy deactivated");
        Ok(())
    }

    pub fn proxy_active(&self) -> bool {
        *self.proxy_active.lock()
    }

    // ── Re-authentication ───────────────────────────────────────────────

    /// Run the login machine again and swap the HTTP state in place.
    /// Called when a response trips expiry detection.
    pub(crate) async fn relogin(&self) -> Result<(), LoginFailure> {
        tracing::warn!(player = %self.player, "session expired, re-authenticating");

        let account = self.account.lock().clone();
        let ctx = login::Context {
            endpoints: self.endpoints.clone(),
            tunables: self.tunables.clone(),
            interactive: self.is_parent,
            prompter: &*self.prompter,
            solver: &*self.solver,
            preselected_world: Some(self.world.clone()),
        };
        let result = login::run(&account, &ctx).await?;

        {
            let mut account = self.account.lock();
            account.cached_auth_token = result.auth_token.clone();
            account.cached_device_token = result.device_token.clone();
        }
        {
            let mut cookies = self.cookies.lock();
            for (name, value) in &result.cookies {
                cookies.insert(name.clone(), value.clone());
            }
        }
        *self.http.write() = HttpState { client: result.client, jar: result.jar };

        if *self.proxy_active.lock() {
            self.activate_proxy().map_err(|e| LoginFailure::Network(e.to_string()))?;
        }

        // The old token belongs to the dead session.
        self.tokens.invalidate_csrf();
        tracing::info!(player = %self.player, "re-authentication complete");
        Ok(())
    }

    // ── Health pinger ───────────────────────────────────────────────────

    /// Start the background health pinger. Idempotent.
    pub fn start_health_pinger(self: &Arc<Self>) {
        let mut slot = self.health_stop.lock();
        if slot.is_some() {
            tracing::warn!("health pinger already running");
            return;
        }
        *slot = Some(health::spawn(Arc::clone(self)));
    }

    /// Stop the health pinger and drop the session's background work.
    pub fn close(&self) {
        if let Some(token) = self.health_stop.lock().take() {
            token.cancel();
        }
        tracing::info!(player = %self.player, "session closed");
    }

    // ── Cookie import/export ────────────────────────────────────────────

    /// Export the session-relevant cookies as pretty JSON.
    pub fn export_cookies(&self) -> String {
        let cookies = self.cookies.lock();
        let mut out = serde_json::Map::new();
        for name in SESSION_COOKIE_NAMES {
            if let Some(value) = cookies.get(name) {
                out.insert(name.to_owned(), serde_json::Value::String(value.clone()));
            }
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(out)).unwrap_or_default()
    }

    /// Export the game cookie as a console snippet that restores the
    /// session in a browser.
    pub fn export_cookie_script(&self) -> String {
        let cookies = self.cookies.lock();
        let Some(value) = cookies.get("ikariam") else {
            return "// No game session cookie found".to_owned();
        };
        format!(
            "cookies={{\"ikariam\":\"{value}\"}};i=0;for(let cookie in cookies)\
             {{document.cookie=Object.keys(cookies)[i]+\"=\"+cookies[cookie];i++}}"
        )
    }

    /// Import cookies from a JSON object or a raw game-cookie value, then
    /// validate with one probe request. Returns whether the imported
    /// session is live.
    pub async fn import_cookies(&self, input: &str) -> Result<bool, GameError> {
        let input = input.trim();
        let cookie_map: HashMap<String, String> = match serde_json::from_str(input) {
            Ok(map) => map,
            Err(_) => {
                let raw = input.strip_prefix("ikariam=").unwrap_or(input);
                HashMap::from([("ikariam".to_owned(), raw.to_owned())])
            }
        };

        {
            let jar = Arc::clone(&self.http.read().jar);
            seed_jar(&jar, &cookie_map, &self.url_base, &self.endpoints.lobby);
            let mut cookies = self.cookies.lock();
            for (name, value) in &cookie_map {
                cookies.insert(name.clone(), value.clone());
            }
        }

        let body = self
            .get_with("", &[], RequestOpts { ignore_expiry: true, ..Default::default() })
            .await?;
        if crate::parse::is_expired(&body) {
            tracing::warn!("imported cookies are invalid or expired");
            return Ok(false);
        }
        self.tokens.try_extract(&body);
        tracing::info!("cookies imported and validated");
        Ok(true)
    }

    /// All currently harvested cookies, by name.
    pub fn session_cookies(&self) -> HashMap<String, String> {
        self.cookies.lock().clone()
    }
}

/// Game-server client: long timeout, shared jar, optional proxy.
fn build_game_client(
    jar: Arc<Jar>,
    proxy: Option<&ProxyConfig>,
) -> Result<reqwest::Client, GameError> {
    let mut builder = reqwest::Client::builder()
        .cookie_provider(jar)
        .timeout(std::time::Duration::from_secs(300));
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
    }
    Ok(builder.build()?)
}

/// Install a cookie map for both the game host and the lobby.
fn seed_jar(jar: &Jar, cookies: &HashMap<String, String>, url_base: &str, lobby: &str) {
    let targets: Vec<reqwest::Url> = [url_base, lobby]
        .iter()
        .filter_map(|u| reqwest::Url::parse(u).ok())
        .collect();
    for (name, value) in cookies {
        for url in &targets {
            jar.add_cookie_str(&format!("{name}={value}"), url);
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
