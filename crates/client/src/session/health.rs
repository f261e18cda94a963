// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background health pinger.
//!
//! Issues one cheap request per interval to keep the session warm and catch
//! expiry before a module trips over it mid-operation. Expiry detection is
//! suppressed in the request itself — the pinger inspects the page and
//! drives the re-login deliberately so failures end up logged, not thrown
//! through a timer task.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::HEALTH_VIEW;
use crate::parse;
use crate::session::{GameSession, RequestOpts};

/// Spawn the pinger for a session. The returned token stops it.
pub(super) fn spawn(session: Arc<GameSession>) -> CancellationToken {
    let stop = CancellationToken::new();
    let cancelled = stop.clone();
    let interval = session.tunables().health_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; the session was just used.
        timer.tick().await;

        tracing::debug!("health pinger started");
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = timer.tick() => {}
            }

            let opts = RequestOpts { ignore_expiry: true, ..Default::default() };
            match session.get_with(HEALTH_VIEW, &[], opts).await {
                Ok(body) => {
                    if parse::is_expired(&body) {
                        tracing::warn!("health ping found the session expired");
                        match session.relogin().await {
                            Ok(()) => tracing::info!("health pinger re-authenticated"),
                            Err(e) => {
                                tracing::error!(err = %e, "health pinger re-login failed")
                            }
                        }
                    } else if parse::is_maintenance(&body) {
                        tracing::info!("health ping: server in maintenance");
                    } else {
                        tracing::debug!("health ping ok");
                    }
                }
                Err(e) => tracing::warn!(err = %e, "health ping failed"),
            }
        }
        tracing::debug!("health pinger stopped");
    });

    stop
}
