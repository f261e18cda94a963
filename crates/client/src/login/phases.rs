// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The individual login phases. Each drives the shared client + cookie jar
//! and returns plain data; branching is reported upward as [`AuthOutcome`].

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};

use crate::account::{Account, WorldId};
use crate::error::LoginFailure;
use crate::parse::{json_i64, json_string};

use super::{device, user_agent_for, Context};

/// Outcome of the credential phase.
pub(crate) enum AuthOutcome {
    /// The lobby accepted the submission; body of the response.
    Accepted(String),
    /// HTTP 409 with `OTP_REQUIRED`: resubmit with a 2FA code.
    NeedOtp,
    /// A `gf-challenge-id` header arrived: solve the captcha, then resubmit
    /// with the challenge id attached.
    NeedCaptcha(String),
    Failed(LoginFailure),
}

/// World/character selection extracted in phase 8.
pub(crate) struct Selection {
    pub player: String,
    pub world: WorldId,
    pub character_id: String,
    pub world_name: String,
}

pub(crate) struct Flow<'a> {
    pub client: reqwest::Client,
    pub jar: Arc<Jar>,
    pub cookies: HashMap<String, String>,
    pub user_agent: &'static str,
    pub device_token: String,
    ctx: &'a Context<'a>,
    account: &'a Account,
    env_ids: Option<(String, String)>,
}

impl<'a> Flow<'a> {
    pub fn start(account: &'a Account, ctx: &'a Context<'a>) -> Result<Self, LoginFailure> {
        let user_agent = user_agent_for(&account.email);
        let (client, jar) = build_client(user_agent)?;
        Ok(Self {
            client,
            jar,
            cookies: HashMap::new(),
            user_agent,
            device_token: String::new(),
            ctx,
            account,
            env_ids: None,
        })
    }

    /// Drop all cookies and start over (cached token turned out dead).
    pub fn reset_client(&mut self) -> Result<(), LoginFailure> {
        let (client, jar) = build_client(self.user_agent)?;
        self.client = client;
        self.jar = jar;
        self.cookies.clear();
        Ok(())
    }

    /// Record `Set-Cookie` headers so the session can serialize/export the
    /// cookies later; the jar keeps them for actual requests.
    fn harvest(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            if let Some((name, val)) = pair.split_once('=') {
                self.cookies.insert(name.trim().to_owned(), val.trim().to_owned());
            }
        }
    }

    fn lobby_referer(&self) -> String {
        format!("{}/", self.ctx.endpoints.lobby)
    }

    // ── Phase 0: cached fast-path ───────────────────────────────────────

    /// Install the cached lobby token and probe the `me` endpoint. A 200
    /// means phases 1-7 can be skipped.
    pub async fn probe_cached_token(&mut self, token: &str) -> bool {
        self.install_auth_cookie(token);
        let request = self
            .client
            .get(self.ctx.endpoints.lobby_me())
            .header("Referer", self.lobby_referer())
            .bearer_auth(token);
        match request.send().await {
            Ok(resp) => {
                self.harvest(&resp);
                resp.status().as_u16() == 200
            }
            Err(e) => {
                tracing::warn!(err = %e, "lobby token probe failed");
                false
            }
        }
    }

    /// Put the lobby token into the jar so later lobby requests carry it.
    pub fn install_auth_cookie(&mut self, token: &str) {
        if let Ok(url) = reqwest::Url::parse(&self.ctx.endpoints.lobby) {
            self.jar.add_cookie_str(&format!("gf-token-production={token}"), &url);
        }
        self.cookies.insert("gf-token-production".to_owned(), token.to_owned());
    }

    // ── Device token ────────────────────────────────────────────────────

    pub async fn resolve_device_token(&mut self) -> Result<(), LoginFailure> {
        if !self.device_token.is_empty() {
            return Ok(());
        }
        self.device_token = device::obtain(
            &self.client,
            self.ctx.endpoints.solver_api.as_deref(),
            self.user_agent,
            &self.account.cached_device_token,
            self.ctx.interactive,
            self.ctx.prompter,
        )
        .await?;
        Ok(())
    }

    // ── Phase 1: environment ids ────────────────────────────────────────

    pub async fn environment_ids(&mut self) -> Result<(), LoginFailure> {
        let resp = self
            .client
            .get(self.ctx.endpoints.lobby_config_js())
            .header("Referer", self.lobby_referer())
            .send()
            .await?;
        self.harvest(&resp);
        let js = resp.text().await?;

        let game_env = capture(r#""gameEnvironmentId":"(.*?)""#, &js)
            .ok_or_else(|| LoginFailure::rejected("gameEnvironmentId not found in lobby config"))?;
        let platform = capture(r#""platformGameId":"(.*?)""#, &js)
            .ok_or_else(|| LoginFailure::rejected("platformGameId not found in lobby config"))?;

        tracing::debug!(game_env = %game_env, platform = %platform, "environment ids resolved");
        self.env_ids = Some((game_env, platform));
        Ok(())
    }

    // ── Phase 2: anti-bot handshake ─────────────────────────────────────

    pub async fn anti_bot_handshake(&mut self) -> Result<(), LoginFailure> {
        let resp = self
            .client
            .get(&self.ctx.endpoints.connect_js)
            .header("Referer", self.lobby_referer())
            .send()
            .await?;
        self.harvest(&resp);
        let body = resp.text().await?;
        if body.contains("Attention Required") {
            return Err(LoginFailure::AntiBotBlocked);
        }

        // Second fetch populates the tracking cookies.
        let resp = self
            .client
            .get(&self.ctx.endpoints.connect_config)
            .header("Referer", self.lobby_referer())
            .header("Origin", &self.ctx.endpoints.lobby)
            .send()
            .await?;
        self.harvest(&resp);
        Ok(())
    }

    // ── Phase 3: device fingerprint (non-fatal) ─────────────────────────

    pub async fn device_fingerprint(&mut self) {
        let page = format!("{}%2F", self.ctx.endpoints.lobby.replace("://", "%3A%2F%2F"));
        let visit = [
            ("product", "ikariam".to_owned()),
            ("server_id", "1".to_owned()),
            ("language", "en".to_owned()),
            ("location", "VISIT".to_owned()),
            ("fp_eval_id", fingerprint_eval_id()),
            ("page", page.clone()),
            ("fingerprint", "2175408712".to_owned()),
            ("fp_exec_time", "1.00".to_owned()),
        ];
        let eval = [
            ("product", "ikariam".to_owned()),
            ("server_id", "1".to_owned()),
            ("language", "en".to_owned()),
            ("location", "fp_eval".to_owned()),
            ("fp_eval_id", fingerprint_eval_id()),
            ("page", page),
            ("fingerprint", "2175408712".to_owned()),
            ("fp2_config_id", "1".to_owned()),
            ("fp2_value", "921af958be7cf2f76db1e448c8a5d89d".to_owned()),
            ("fp2_exec_time", "96.00".to_owned()),
        ];

        for payload in [&visit[..], &eval[..]] {
            let result = self
                .client
                .post(&self.ctx.endpoints.fingerprint)
                .header("Origin", &self.ctx.endpoints.lobby)
                .header("Referer", self.lobby_referer())
                .form(payload)
                .send()
                .await;
            match result {
                Ok(resp) => self.harvest(&resp),
                Err(e) => {
                    tracing::info!(err = %e, "fingerprint submission failed (non-fatal)");
                    return;
                }
            }
        }
    }

    // ── Phase 4: CORS preflight ─────────────────────────────────────────

    pub async fn cors_preflight(&mut self) -> Result<(), LoginFailure> {
        let resp = self
            .client
            .request(reqwest::Method::OPTIONS, &self.ctx.endpoints.auth_options)
            .header("Access-Control-Request-Headers", "content-type,tnt-installation-id")
            .header("Access-Control-Request-Method", "POST")
            .header("Origin", &self.ctx.endpoints.lobby)
            .header("Referer", self.lobby_referer())
            .send()
            .await?;
        self.harvest(&resp);
        Ok(())
    }

    // ── Phase 5: credential submission ──────────────────────────────────

    pub async fn authenticate(
        &mut self,
        otp: Option<&str>,
        challenge_id: Option<&str>,
    ) -> Result<AuthOutcome, LoginFailure> {
        let Some((game_env, platform)) = self.env_ids.clone() else {
            return Ok(AuthOutcome::Failed(LoginFailure::rejected(
                "environment ids missing before credential submission",
            )));
        };

        let mut body = serde_json::json!({
            "identity": self.account.email,
            "password": self.account.secret,
            "locale": "en-GB",
            "gfLang": "en",
            "gameId": platform,
            "gameEnvironmentId": game_env,
            "blackbox": self.device_token,
        });
        if let Some(code) = otp {
            body["otpCode"] = serde_json::Value::String(code.to_owned());
        }

        let mut request = self
            .client
            .post(&self.ctx.endpoints.auth_sessions)
            .header("Origin", &self.ctx.endpoints.lobby)
            .header("Referer", self.lobby_referer())
            .header("TNT-Installation-Id", "")
            .json(&body);
        if let Some(id) = challenge_id {
            request = request.header("Gf-Challenge-Id", id);
        }

        let resp = request.send().await?;
        self.harvest(&resp);
        let status = resp.status().as_u16();

        if let Some(raw) = resp.headers().get("gf-challenge-id") {
            let id = raw
                .to_str()
                .unwrap_or_default()
                .split(';')
                .next()
                .unwrap_or_default()
                .to_owned();
            if !id.is_empty() {
                return Ok(AuthOutcome::NeedCaptcha(id));
            }
        }

        let text = resp.text().await?;
        if status == 409 && text.contains("OTP_REQUIRED") {
            return Ok(AuthOutcome::NeedOtp);
        }
        Ok(AuthOutcome::Accepted(text))
    }

    // ── Phase 6: one captcha round ──────────────────────────────────────

    /// Fetch the challenge images, ask the solver, submit the answer.
    /// Returns whether the challenge reports `solved`.
    pub async fn captcha_round(&mut self, challenge_id: &str) -> Result<bool, LoginFailure> {
        // Landing page first; it sets challenge cookies.
        let landing = format!("{}/{}", self.ctx.endpoints.challenge, challenge_id);
        let resp = self.client.get(&landing).send().await?;
        self.harvest(&resp);

        let meta_url = format!("{}/{}/en-GB", self.ctx.endpoints.challenge_images, challenge_id);
        let meta: serde_json::Value = self.client.get(&meta_url).send().await?.json().await?;
        let stamp = meta.get("lastUpdated").and_then(|v| v.as_i64()).unwrap_or_default();

        let text_image =
            self.client.get(format!("{meta_url}/text?{stamp}")).send().await?.bytes().await?;
        let icons_image = self
            .client
            .get(format!("{meta_url}/drag-icons?{stamp}"))
            .send()
            .await?
            .bytes()
            .await?;

        let answer = match self.ctx.solver.solve(&text_image, &icons_image).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(err = %e, "captcha solver chain failed");
                return Err(LoginFailure::CaptchaUnsolvable);
            }
        };

        let verdict: serde_json::Value = self
            .client
            .post(&meta_url)
            .json(&serde_json::json!({ "answer": answer }))
            .send()
            .await?
            .json()
            .await?;
        let solved = verdict.get("status").and_then(|v| v.as_str()) == Some("solved");
        if !solved {
            tracing::warn!(answer, "captcha answer rejected");
        }
        Ok(solved)
    }

    // ── Phase 7: auth token extraction ──────────────────────────────────

    pub async fn extract_auth_token(&mut self, auth_body: &str) -> Result<String, LoginFailure> {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(auth_body) {
            if let Some(token) = json.get("token").and_then(|v| v.as_str()) {
                return Ok(token.to_owned());
            }
        }

        if !self.ctx.interactive {
            return Err(LoginFailure::rejected(
                "auth response carried no token and no prompt is available",
            ));
        }

        let token = self.ctx.prompter.read_line(
            "  Automatic token extraction failed. Paste the lobby token cookie \
             (value of gf-token-production) from your browser: ",
        );
        // Tolerate a pasted `name=value` pair.
        let token = token.rsplit('=').next().unwrap_or_default().trim().to_owned();
        if token.is_empty() {
            return Err(LoginFailure::rejected("no token provided"));
        }

        if !self.probe_cached_token(&token).await {
            return Err(LoginFailure::rejected("manually entered lobby token is invalid"));
        }
        Ok(token)
    }

    // ── Phase 8: world/character selection ──────────────────────────────

    pub async fn select_world(&mut self, auth_token: &str) -> Result<Selection, LoginFailure> {
        let accounts: serde_json::Value = self
            .client
            .get(self.ctx.endpoints.lobby_accounts())
            .header("Referer", self.lobby_referer())
            .bearer_auth(auth_token)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| LoginFailure::rejected(format!("account list unreadable: {e}")))?;

        let servers: serde_json::Value = self
            .client
            .get(self.ctx.endpoints.lobby_servers())
            .header("Referer", self.lobby_referer())
            .bearer_auth(auth_token)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| LoginFailure::rejected(format!("server list unreadable: {e}")))?;

        let candidates: Vec<&serde_json::Value> = accounts
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter(|a| !a.get("blocked").and_then(|b| b.as_bool()).unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default();
        if candidates.is_empty() {
            return Err(LoginFailure::rejected("no active characters on this account"));
        }

        let wanted = self
            .ctx
            .preselected_world
            .clone()
            .or_else(|| self.account.preferred_world().cloned());

        let chosen = match wanted.as_ref().and_then(|w| {
            candidates.iter().find(|a| {
                account_world(a).is_some_and(|(num, lang)| num == w.number && lang == w.language)
            })
        }) {
            Some(found) => *found,
            None => self.choose_character(&candidates, &servers),
        };

        let player = json_string(chosen, "name")
            .ok_or_else(|| LoginFailure::rejected("character entry has no name"))?;
        let character_id = json_string(chosen, "id")
            .ok_or_else(|| LoginFailure::rejected("character entry has no id"))?;
        let (number, login_language) = account_world(chosen)
            .ok_or_else(|| LoginFailure::rejected("character entry has no server"))?;

        // The servers list carries the display name and the canonical
        // language for the world.
        let group = json_string(chosen, "accountGroup").unwrap_or_default();
        let mut world_name = String::new();
        let mut language = login_language;
        if let Some(list) = servers.as_array() {
            if let Some(server) =
                list.iter().find(|s| json_string(s, "accountGroup").as_deref() == Some(&group))
            {
                world_name = json_string(server, "name").unwrap_or_default();
                if let Some(lang) = json_string(server, "language") {
                    language = lang;
                }
            }
        }

        let world = WorldId { number, language };
        tracing::info!(player = %player, world = %world, "character selected");
        Ok(Selection { player, world, character_id, world_name })
    }

    fn choose_character<'v>(
        &self,
        candidates: &[&'v serde_json::Value],
        servers: &serde_json::Value,
    ) -> &'v serde_json::Value {
        if candidates.len() == 1 || !self.ctx.interactive {
            return candidates[0];
        }

        let mut menu = String::from("\nWhich character do you want to play?\n");
        for (i, account) in candidates.iter().enumerate() {
            let name = json_string(account, "name").unwrap_or_default();
            let world = account_world(account)
                .map(|(num, lang)| format!("s{num}-{lang}"))
                .unwrap_or_default();
            let group = json_string(account, "accountGroup").unwrap_or_default();
            let world_name = servers
                .as_array()
                .and_then(|list| {
                    list.iter()
                        .find(|s| json_string(s, "accountGroup").as_deref() == Some(&group))
                        .and_then(|s| json_string(s, "name"))
                })
                .unwrap_or_default();
            menu.push_str(&format!("  ({}) {}  [{} - {}]\n", i + 1, name, world, world_name));
        }
        menu.push_str("Select: ");

        let pick = self.ctx.prompter.read_choice(&menu, 1, candidates.len() as i64);
        candidates[(pick - 1) as usize]
    }

    // ── Phase 9: game-world handoff ─────────────────────────────────────

    pub async fn enter_world(
        &mut self,
        auth_token: &str,
        selection: &Selection,
        game_headers: &[(String, String)],
    ) -> Result<String, LoginFailure> {
        let body = serde_json::json!({
            "server": {
                "language": selection.world.language,
                "number": selection.world.number.to_string(),
            },
            "clickedButton": "account_list",
            "id": selection.character_id,
            "blackbox": self.device_token,
        });

        let resp = self
            .client
            .post(self.ctx.endpoints.lobby_login_link())
            .header("Origin", &self.ctx.endpoints.lobby)
            .header("Referer", self.lobby_referer())
            .bearer_auth(auth_token)
            .json(&body)
            .send()
            .await?;
        self.harvest(&resp);
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|_| LoginFailure::rejected(format!("world entry failed ({status}): {text}")))?;
        let Some(signed_url) = json.get("url").and_then(|v| v.as_str()) else {
            return Err(LoginFailure::rejected(format!("world entry failed ({status}): {text}")));
        };

        let pattern_ok = Regex::new(&self.ctx.endpoints.game_url_pattern)
            .map(|re| re.is_match(signed_url))
            .unwrap_or(false);
        if !pattern_ok {
            return Err(LoginFailure::rejected(format!(
                "world entry URL has unexpected shape: {signed_url}"
            )));
        }

        let resp = self
            .client
            .get(signed_url)
            .headers(header_map(game_headers))
            .send()
            .await?;
        self.harvest(&resp);
        Ok(resp.text().await?)
    }
}

// ── helpers ─────────────────────────────────────────────────────────────

fn build_client(user_agent: &str) -> Result<(reqwest::Client, Arc<Jar>), LoginFailure> {
    let jar = Arc::new(Jar::default());
    let client = reqwest::Client::builder()
        .cookie_provider(Arc::clone(&jar))
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(user_agent)
        .build()?;
    Ok((client, jar))
}

fn capture(pattern: &str, hay: &str) -> Option<String> {
    Regex::new(pattern).ok()?.captures(hay)?.get(1).map(|m| m.as_str().to_owned())
}

/// `(number, language)` of the world a lobby character lives on.
fn account_world(account: &serde_json::Value) -> Option<(u32, String)> {
    let server = account.get("server")?;
    let number = json_i64(server, "number")? as u32;
    let language = json_string(server, "language")?;
    Some((number, language))
}

/// Random UUID-shaped id for the fingerprint collector.
fn fingerprint_eval_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let mut hex = || format!("{:04x}", rng.random_range(0..=0xffffu32));
    format!("{}{}-{}-{}-{}-{}{}{}", hex(), hex(), hex(), hex(), hex(), hex(), hex(), hex())
}

pub(crate) fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let Ok(name) = HeaderName::try_from(name.as_str()) else { continue };
        let Ok(value) = HeaderValue::try_from(value.as_str()) else { continue };
        map.insert(name, value);
    }
    map
}
