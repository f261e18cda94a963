// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide knobs and endpoint bases.
//!
//! `Tunables` is an immutable record constructed once per process and passed
//! into the session, lock, and transport layers explicitly — no module-level
//! singletons. `Endpoints` carries the lobby/game URL bases so tests can
//! point the whole stack at a local fake server.

use std::path::PathBuf;
use std::time::Duration;

/// Resource names in canonical cargo-vector order.
pub const MATERIALS: [&str; 5] = ["Wood", "Wine", "Marble", "Crystal", "Sulfur"];

/// Number of slots in a cargo vector.
pub const MATERIALS_COUNT: usize = 5;

/// Placeholder substituted with the live action-request token in templated
/// URLs and payloads.
pub const ACTION_REQUEST_PLACEHOLDER: &str = "REQUESTID";

/// Query fragment for fetching a city view.
pub const CITY_VIEW: &str = "view=city&cityId=";

/// Query fragment for fetching an island view.
pub const ISLAND_VIEW: &str = "view=island&islandId=";

/// Lightweight endpoint used by the health pinger to keep the session warm.
pub const HEALTH_VIEW: &str = "view=updateGlobalData";

/// Cookies worth exporting/serializing to restore a session elsewhere.
pub const SESSION_COOKIE_NAMES: [&str; 6] = [
    "ikariam",
    "PHPSESSID",
    "gf-token-production",
    "GTPINGRESSCOOKIE",
    "cf_clearance",
    "__cf_bm",
];

/// Timing and retry knobs shared by the whole stack.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Minimum interval between outbound game requests.
    pub min_request_interval_ms: u64,
    /// Sleep before retrying after a connection error or timeout.
    pub connection_backoff_secs: u64,
    /// Sleep while the server reports a backup in progress.
    pub maintenance_wait_secs: u64,
    /// Interval between health pings.
    pub health_interval_secs: u64,
    /// Whole-login retry attempts.
    pub login_max_attempts: u32,
    /// Delay between whole-login retries.
    pub login_retry_delay_secs: u64,
    /// Captcha attempts before giving up.
    pub captcha_max_attempts: u32,
    /// Age after which a fleet lock holder is presumed dead.
    pub lock_stale_secs: u64,
    /// Poll interval while waiting on a held fleet lock.
    pub lock_poll_secs: u64,
    /// Single fleet-lock acquisition timeout.
    pub lock_timeout_secs: u64,
    /// Lock acquisition attempts per transport batch.
    pub lock_attempts: u32,
    /// Sleep between lock acquisition attempts.
    pub lock_retry_delay_secs: u64,
    /// Cumulative budget for waiting on returning fleets.
    pub fleet_wait_budget_secs: u64,
    /// Upper bound of the random jitter added to fleet ETAs.
    pub fleet_wait_jitter_secs: u64,
    /// Sleep when the destination has no free storage.
    pub destination_full_wait_secs: u64,
    /// Per-leg send attempts before the route is abandoned.
    pub send_max_retries: u32,
    /// Heartbeat refresh cadence inside long sleeps.
    pub heartbeat_refresh_secs: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 300,
            connection_backoff_secs: 5 * 60,
            maintenance_wait_secs: 10 * 60,
            health_interval_secs: 5 * 60,
            login_max_attempts: 3,
            login_retry_delay_secs: 2,
            captcha_max_attempts: 5,
            lock_stale_secs: 10 * 60,
            lock_poll_secs: 5,
            lock_timeout_secs: 5 * 60,
            lock_attempts: 3,
            lock_retry_delay_secs: 60,
            fleet_wait_budget_secs: 2 * 60 * 60,
            fleet_wait_jitter_secs: 60,
            destination_full_wait_secs: 60 * 60,
            send_max_retries: 20,
            heartbeat_refresh_secs: 5 * 60,
        }
    }
}

impl Tunables {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn connection_backoff(&self) -> Duration {
        Duration::from_secs(self.connection_backoff_secs)
    }

    pub fn maintenance_wait(&self) -> Duration {
        Duration::from_secs(self.maintenance_wait_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn fleet_wait_budget(&self) -> Duration {
        Duration::from_secs(self.fleet_wait_budget_secs)
    }

    /// Values suitable for unit tests: no multi-minute sleeps.
    pub fn fast() -> Self {
        Self {
            min_request_interval_ms: 0,
            connection_backoff_secs: 0,
            maintenance_wait_secs: 0,
            health_interval_secs: 1,
            login_retry_delay_secs: 0,
            lock_poll_secs: 0,
            lock_timeout_secs: 1,
            lock_retry_delay_secs: 0,
            fleet_wait_budget_secs: 2,
            fleet_wait_jitter_secs: 0,
            destination_full_wait_secs: 1,
            send_max_retries: 3,
            heartbeat_refresh_secs: 1,
            ..Self::default()
        }
    }
}

/// URL bases for the lobby, auth, and ancillary vendor hosts.
///
/// The game-server base is not here: it is produced by the login flow from
/// the selected world (`s{num}-{lang}.{game_domain}`).
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Lobby host base, e.g. `https://lobby.ikariam.gameforge.com`.
    pub lobby: String,
    /// Credential-submission endpoint (the `sessions` API).
    pub auth_sessions: String,
    /// CORS-preflighted auth endpoint hit with OPTIONS.
    pub auth_options: String,
    /// Anti-bot `connect.js` endpoint.
    pub connect_js: String,
    /// Anti-bot config endpoint re-fetched for tracking cookies.
    pub connect_config: String,
    /// Device fingerprint collector.
    pub fingerprint: String,
    /// Captcha challenge landing host base.
    pub challenge: String,
    /// Captcha image host base (text + drag-icons).
    pub challenge_images: String,
    /// External solver/token API base, if configured.
    pub solver_api: Option<String>,
    /// Domain suffix for game servers.
    pub game_domain: String,
    /// Pattern a signed world-entry URL must match before it is followed.
    pub game_url_pattern: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        let lobby = "https://lobby.ikariam.gameforge.com".to_owned();
        Self {
            auth_sessions: "https://gameforge.com/api/v1/auth/thin/sessions".to_owned(),
            auth_options: "https://gameforge.com/api/v1/auth/thin/sessions".to_owned(),
            connect_js: "https://gameforge.com/js/connect.js".to_owned(),
            connect_config: "https://gameforge.com/config".to_owned(),
            fingerprint: "https://pixelzirkus.gameforge.com/do/simple".to_owned(),
            challenge: "https://challenge.gameforge.com/challenge".to_owned(),
            challenge_images: "https://image-drop-challenge.gameforge.com/challenge".to_owned(),
            solver_api: std::env::var("ARGOSY_SOLVER_API").ok(),
            game_domain: "ikariam.gameforge.com".to_owned(),
            game_url_pattern: r"^https://s\d+-\w+\.ikariam\.gameforge\.com/index\.php\?"
                .to_owned(),
            lobby,
        }
    }
}

impl Endpoints {
    pub fn lobby_config_js(&self) -> String {
        format!("{}/config/configuration.js", self.lobby)
    }

    pub fn lobby_me(&self) -> String {
        format!("{}/api/users/me", self.lobby)
    }

    pub fn lobby_accounts(&self) -> String {
        format!("{}/api/users/me/accounts", self.lobby)
    }

    pub fn lobby_servers(&self) -> String {
        format!("{}/api/servers", self.lobby)
    }

    pub fn lobby_login_link(&self) -> String {
        format!("{}/api/users/me/loginLink", self.lobby)
    }

    /// Game server host for a world, e.g. `s59-en.ikariam.gameforge.com`.
    pub fn game_host(&self, number: u32, language: &str) -> String {
        format!("s{}-{}.{}", number, language, self.game_domain)
    }

    /// Base URL all game requests are appended to.
    pub fn game_url_base(&self, number: u32, language: &str) -> String {
        format!("https://{}/index.php?", self.game_host(number, language))
    }
}

/// Resolve the state directory for argosy's per-account files.
///
/// Checks `ARGOSY_STATE_DIR`, then the home directory, then `.` as a last
/// resort. The registry, mailbox, autoload, lock, and handoff files all live
/// here as dot-files.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARGOSY_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Sanitize a world/user value for use in a state file name.
pub fn path_component(raw: &str) -> String {
    raw.replace(['/', '\\'], "_")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
