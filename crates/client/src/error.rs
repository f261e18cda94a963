// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds surfaced by the game client.
//!
//! Recovery lives at the lowest layer able to handle it: the session retries
//! network/maintenance/expiry/stale-token conditions itself, the transport
//! engine handles lock and fleet trouble, and only the kinds below escape to
//! callers.

use std::time::Duration;

use thiserror::Error;

use crate::parse::ParseError;

/// Errors produced by the session and transport layers.
#[derive(Debug, Error)]
pub enum GameError {
    /// A connection or timeout failure that exhausted local handling.
    #[error("network failure talking to the game server: {0}")]
    Network(String),

    /// The session expired and the re-login that followed also failed.
    #[error("session expired and re-authentication failed: {0}")]
    ReauthFailed(LoginFailure),

    /// A login run failed outright.
    #[error(transparent)]
    Login(#[from] LoginFailure),

    /// A game response did not contain what the parser needed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The fleet lock stayed held past the acquisition bound.
    #[error("fleet lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// The server rejected the action-request token twice in a row; the
    /// single retry-with-fresh-token already happened.
    #[error("server rejected the action-request token twice")]
    StaleCsrf,

    /// The game kept answering a transport request with something we do not
    /// understand.
    #[error("unexpected game response after {attempts} attempts: {detail}")]
    RouteUnexpectedResponse { attempts: u32, detail: String },

    /// No ships came free within the cumulative wait budget.
    #[error("no ships became available within the wait budget")]
    FleetWaitExhausted,

    /// Fewer ships left port than the dispatch should have consumed.
    #[error("expected {expected} ships consumed, observed {observed}")]
    ShipsNotConsumed { expected: u32, observed: u32 },
}

impl From<reqwest::Error> for GameError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Why a login run failed. `Vacation` is terminal; everything else is
/// retried up to the configured attempt count by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginFailure {
    /// The account is in vacation mode; retrying cannot help.
    #[error("account is in vacation mode")]
    Vacation,

    /// The anti-bot interstitial blocked the handshake.
    #[error("anti-bot challenge page blocked the handshake")]
    AntiBotBlocked,

    /// The captcha subphase ran out of attempts or solvers.
    #[error("captcha could not be solved")]
    CaptchaUnsolvable,

    /// 2FA was demanded but no interactive prompt is available.
    #[error("2FA required but running non-interactively")]
    OtpUnavailable,

    /// A phase saw a response it could not accept.
    #[error("{0}")]
    Rejected(String),

    /// The network failed mid-flow.
    #[error("network failure during login: {0}")]
    Network(String),
}

impl LoginFailure {
    /// Terminal failures are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Vacation)
    }

    pub(crate) fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

impl From<reqwest::Error> for LoginFailure {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
