// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session's GET/POST verbs with their recovery loops.
//!
//! Guarantees (per request):
//! - rate-limited, then recorded in the diagnostics ring;
//! - the response body feeds the token cache before anything else;
//! - maintenance pages sleep and retry, transient network failures back off
//!   and retry indefinitely;
//! - expiry (unless ignored) triggers one re-login and a retry; a failed
//!   re-login propagates;
//! - POSTs carry the freshest observed action-request token and retry
//!   exactly once on a stale-token rejection.

use reqwest::header::CONTENT_TYPE;
use tokio::time::Instant;

use crate::config::ACTION_REQUEST_PLACEHOLDER;
use crate::error::GameError;
use crate::history::RequestRecord;
use crate::parse;

use super::GameSession;

/// Query/form key-value pairs.
pub type Params = Vec<(String, String)>;

/// Per-request switches, mirroring what modules actually need.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestOpts {
    /// Do not treat an expiry page as fatal (used by the health pinger and
    /// cookie-import validation, which inspect the page themselves).
    pub ignore_expiry: bool,
    /// Drop the `index.php` segment from the base URL.
    pub skip_index: bool,
}

/// A response with its status, for callers that need more than the body.
#[derive(Debug, Clone)]
pub struct GameResponse {
    pub status: u16,
    pub body: String,
}

enum PostOutcome {
    Done(GameResponse),
    StaleToken,
}

impl GameSession {
    /// `GET {url_base}{tail}`.
    pub async fn get(&self, tail: &str) -> Result<String, GameError> {
        self.get_with(tail, &[], RequestOpts::default()).await
    }

    pub async fn get_with(
        &self,
        tail: &str,
        params: &[(String, String)],
        opts: RequestOpts,
    ) -> Result<String, GameError> {
        Ok(self.get_full(tail, params, opts).await?.body)
    }

    pub async fn get_full(
        &self,
        tail: &str,
        params: &[(String, String)],
        opts: RequestOpts,
    ) -> Result<GameResponse, GameError> {
        let url = self.request_url(tail, opts.skip_index);

        loop {
            self.limiter().acquire().await;
            self.push_history(RequestRecord {
                method: "GET",
                url: url.clone(),
                param_keys: params.iter().map(|(k, _)| k.clone()).collect(),
                payload_keys: vec![],
                status: None,
                elapsed: None,
            });

            let started = Instant::now();
            let mut request = self
                .client()
                .get(&url)
                .headers(crate::login::header_map(self.game_headers()));
            if !params.is_empty() {
                request = request.query(params);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    self.network_backoff("GET", &e).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            self.harvest_cookies(&response);
            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    self.network_backoff("GET", &e).await;
                    continue;
                }
            };
            self.complete_history(status, started.elapsed());
            self.tokens().try_extract(&body);

            if parse::is_maintenance(&body) {
                tracing::warn!("server backup in progress, waiting");
                tokio::time::sleep(self.tunables().maintenance_wait()).await;
                continue;
            }

            if !opts.ignore_expiry && parse::is_expired(&body) {
                self.relogin().await.map_err(GameError::ReauthFailed)?;
                continue;
            }

            return Ok(GameResponse { status, body });
        }
    }

    /// `POST {url_base}{tail}` with the action-request token injected into
    /// the URL template, payload, and params. Adds `ajax=1` when a query is
    /// present without one, and form-encodes the payload.
    pub async fn post(&self, tail: &str) -> Result<String, GameError> {
        self.post_with(tail, &[], &[], RequestOpts::default()).await
    }

    pub async fn post_with(
        &self,
        tail: &str,
        payload: &[(String, String)],
        params: &[(String, String)],
        opts: RequestOpts,
    ) -> Result<String, GameError> {
        Ok(self.post_full(tail, payload, params, opts).await?.body)
    }

    pub async fn post_full(
        &self,
        tail: &str,
        payload: &[(String, String)],
        params: &[(String, String)],
        opts: RequestOpts,
    ) -> Result<GameResponse, GameError> {
        match self.post_attempt(tail, payload, params, opts).await? {
            PostOutcome::Done(resp) => Ok(resp),
            PostOutcome::StaleToken => {
                tracing::debug!("stale action-request token, refetching and retrying once");
                self.tokens().invalidate_csrf();
                match self.post_attempt(tail, payload, params, opts).await? {
                    PostOutcome::Done(resp) => Ok(resp),
                    PostOutcome::StaleToken => Err(GameError::StaleCsrf),
                }
            }
        }
    }

    async fn post_attempt(
        &self,
        tail: &str,
        payload: &[(String, String)],
        params: &[(String, String)],
        opts: RequestOpts,
    ) -> Result<PostOutcome, GameError> {
        loop {
            // Freshest observed token, fetching a page if the cache is cold
            // (first POST of a session or after invalidation).
            let token = match self.tokens().csrf() {
                Some(token) => token,
                None => self.refresh_csrf().await?,
            };

            let url = self
                .request_url(&tail.replace(ACTION_REQUEST_PLACEHOLDER, &token), opts.skip_index);
            let payload = inject_token(payload, &token);
            let mut params = inject_token(params, &token);
            if !params.is_empty() && !has_key(&params, "ajax") && !has_key(&payload, "ajax") {
                params.push(("ajax".to_owned(), "1".to_owned()));
            }

            self.limiter().acquire().await;
            self.push_history(RequestRecord {
                method: "POST",
                url: url.clone(),
                param_keys: params.iter().map(|(k, _)| k.clone()).collect(),
                payload_keys: payload.iter().map(|(k, _)| k.clone()).collect(),
                status: None,
                elapsed: None,
            });

            let started = Instant::now();
            let mut request = self
                .client()
                .post(&url)
                .headers(crate::login::header_map(self.game_headers()))
                .form(&payload)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8");
            if !params.is_empty() {
                request = request.query(&params);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    self.network_backoff("POST", &e).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            self.harvest_cookies(&response);
            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    self.network_backoff("POST", &e).await;
                    continue;
                }
            };
            self.complete_history(status, started.elapsed());
            self.tokens().try_extract(&body);

            if parse::is_maintenance(&body) {
                tracing::warn!("server backup in progress, waiting");
                tokio::time::sleep(self.tunables().maintenance_wait()).await;
                continue;
            }

            if !opts.ignore_expiry && parse::is_expired(&body) {
                self.relogin().await.map_err(GameError::ReauthFailed)?;
                continue;
            }

            if parse::is_stale_token(&body) {
                return Ok(PostOutcome::StaleToken);
            }

            return Ok(PostOutcome::Done(GameResponse { status, body }));
        }
    }

    /// Fetch the base page just to repopulate the token cache.
    async fn refresh_csrf(&self) -> Result<String, GameError> {
        self.get("").await?;
        self.tokens().csrf().ok_or(GameError::Parse(crate::parse::ParseError::Missing {
            what: "action-request token",
        }))
    }

    fn request_url(&self, tail: &str, skip_index: bool) -> String {
        if skip_index {
            format!("{}{}", self.url_base.replace("index.php", ""), tail)
        } else {
            format!("{}{}", self.url_base, tail)
        }
    }

    async fn network_backoff(&self, verb: &str, err: &reqwest::Error) {
        tracing::warn!(
            verb,
            err = %err,
            backoff_secs = self.tunables().connection_backoff_secs,
            "network failure, backing off"
        );
        tokio::time::sleep(self.tunables().connection_backoff()).await;
    }
}

fn inject_token(pairs: &[(String, String)], token: &str) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            if k == "actionRequest" || v == ACTION_REQUEST_PLACEHOLDER {
                (k.clone(), token.to_owned())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

fn has_key(pairs: &[(String, String)], key: &str) -> bool {
    pairs.iter().any(|(k, _)| k == key)
}
