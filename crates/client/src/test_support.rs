// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders for tests: sessions pointed at a local fake server, headless
//! capability stubs. Also used by the workspace-level spec tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::account::{Account, WorldId};
use crate::config::{Endpoints, Tunables};
use crate::login::captcha::CaptchaSolver;
use crate::prompt::Headless;
use crate::session::{GameSession, SessionDeps, SessionState};

/// Solver that always answers the same icon index.
pub struct FixedSolver(pub u8);

#[async_trait]
impl CaptchaSolver for FixedSolver {
    async fn solve(&self, _text_image: &[u8], _icons_image: &[u8]) -> anyhow::Result<u8> {
        Ok(self.0)
    }
}

/// Endpoints rewritten to sit entirely on one local base URL.
pub fn test_endpoints(base: &str) -> Endpoints {
    Endpoints {
        lobby: base.to_owned(),
        auth_sessions: format!("{base}/auth/sessions"),
        auth_options: format!("{base}/auth/sessions"),
        connect_js: format!("{base}/js/connect.js"),
        connect_config: format!("{base}/config"),
        fingerprint: format!("{base}/do/simple"),
        challenge: format!("{base}/challenge"),
        challenge_images: format!("{base}/challenge-images"),
        solver_api: None,
        game_domain: "game.test".to_owned(),
        game_url_pattern: r"^http://127\.0\.0\.1:\d+/index\.php\?".to_owned(),
    }
}

pub fn test_deps(base: &str) -> SessionDeps {
    SessionDeps {
        endpoints: test_endpoints(base),
        tunables: Tunables::fast(),
        prompter: Arc::new(Headless),
        solver: Arc::new(FixedSolver(0)),
    }
}

/// A worker-style session record pointed at a local fake game server.
pub fn test_state(base: &str) -> SessionState {
    SessionState {
        host: base.trim_start_matches("http://").to_owned(),
        url_base: format!("{base}/index.php?"),
        player: "Zeno".to_owned(),
        world: WorldId::new(59, "en"),
        character_id: "char-1".to_owned(),
        world_name: "Alpha".to_owned(),
        auth_token: "test-auth-token".to_owned(),
        device_token: "tra:Abc123def456GHI".to_owned(),
        game_headers: vec![("X-Requested-With".to_owned(), "XMLHttpRequest".to_owned())],
        cookies: HashMap::from([("ikariam".to_owned(), "cookie-value".to_owned())]),
        proxy: None,
        proxy_active: false,
        account: Account::new("zeno@example.com", "hunter2"),
        csrf_token: String::new(),
        current_city_id: String::new(),
    }
}

/// A restored (worker-mode) session against a local fake game server.
pub fn test_session(base: &str) -> Arc<GameSession> {
    GameSession::restore(test_state(base), test_deps(base)).unwrap_or_else(|e| {
        // Test-only: a session that cannot even be constructed means the
        // harness itself is broken.
        unreachable!("test session construction failed: {e}")
    })
}
