// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet observation helpers: free-ship counts, per-ship capacity, and the
//! ETA of the nearest returning fleet.

use std::time::Duration;

use rand::Rng;
use regex::Regex;

use crate::config::ACTION_REQUEST_PLACEHOLDER;
use crate::error::GameError;
use crate::lock::ShipClass;
use crate::parse;
use crate::session::GameSession;

/// Fallback per-ship cargo capacity when the page cannot be parsed.
const DEFAULT_CAPACITY: u32 = 500;

/// Count of currently idle ships of a class, read off the global menu.
pub async fn available_ships(session: &GameSession, class: ShipClass) -> Result<u32, GameError> {
    let html = session.get("").await?;
    let pattern = match class {
        ShipClass::Merchant => r#"GlobalMenu_freeTransporters">(\d+)<"#,
        ShipClass::Freighter => r#"GlobalMenu_freeFreighters">(\d+)<"#,
    };
    let count = Regex::new(pattern)
        .ok()
        .and_then(|re| re.captures(&html))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Ok(count)
}

/// Per-ship cargo capacity for both classes, from the merchant-navy view.
pub async fn ship_capacity(session: &GameSession) -> Result<(u32, u32), GameError> {
    let body = session.post("view=merchantNavy").await?;
    let grab = |pattern: &str| {
        Regex::new(pattern)
            .ok()
            .and_then(|re| re.captures(&body))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };
    let merchant = grab(r#"singleTransporterCapacity":(\d+)"#);
    let freighter = grab(r#"singleFreighterCapacity":(\d+)"#);
    if merchant.is_none() || freighter.is_none() {
        tracing::warn!("could not parse ship capacity, using defaults");
    }
    Ok((merchant.unwrap_or(DEFAULT_CAPACITY), freighter.unwrap_or(DEFAULT_CAPACITY)))
}

/// Capacity of one ship of the given class.
pub async fn class_capacity(session: &GameSession, class: ShipClass) -> Result<u32, GameError> {
    let (merchant, freighter) = ship_capacity(session).await?;
    Ok(match class {
        ShipClass::Merchant => merchant,
        ShipClass::Freighter => freighter,
    })
}

/// Seconds until the nearest own fleet arrives, with a little jitter so
/// concurrent workers don't wake in lockstep. `None` when nothing is in
/// transit (or the advisor page cannot be read).
pub async fn nearest_fleet_eta(session: &GameSession) -> Result<Option<Duration>, GameError> {
    let city_id = match session.tokens().current_city() {
        Some(id) => id,
        None => {
            session.get("").await?;
            match session.tokens().current_city() {
                Some(id) => id,
                None => return Ok(None),
            }
        }
    };

    let url = format!(
        "view=militaryAdvisor&oldView=city&oldBackgroundView=city&backgroundView=city\
         &currentCityId={city_id}&actionRequest={ACTION_REQUEST_PLACEHOLDER}&ajax=1"
    );
    let body = session.post(&url).await?;

    let Ok(data) = serde_json::from_str::<serde_json::Value>(&body) else {
        tracing::warn!("could not parse fleet movements for wait time");
        return Ok(None);
    };

    let now = data
        .get(0)
        .and_then(|v| v.get(1))
        .and_then(|v| parse::json_i64(v, "time"))
        .unwrap_or(0);
    let movements = data
        .get(1)
        .and_then(|v| v.get(1))
        .and_then(|v| v.get(2))
        .and_then(|v| v.get("viewScriptParams"))
        .and_then(|v| v.get("militaryAndFleetMovements"))
        .and_then(|v| v.as_array());
    let Some(movements) = movements else {
        return Ok(None);
    };

    let nearest = movements
        .iter()
        .filter(|m| m.get("isOwnArmyOrFleet").and_then(|v| v.as_bool()).unwrap_or(false))
        .filter_map(|m| parse::json_i64(m, "eventTime"))
        .map(|event| (event - now).max(0) as u64)
        .min();

    Ok(nearest.map(|secs| {
        let jitter = session.tunables().fleet_wait_jitter_secs;
        let extra = if jitter > 0 { rand::rng().random_range(0..=jitter) } else { 0 };
        Duration::from_secs(secs + extra)
    }))
}

/// Wait until at least one ship of the class is free.
///
/// Sleeps on the nearest fleet ETA between checks (minimum one minute) and
/// gives up once `budget` is spent. The budget is supplied by the caller:
/// a route waiting for ships across several legs passes the *remaining*
/// share of its one route-level budget, so the cap stays cumulative
/// instead of resetting per call.
pub async fn wait_for_arrival(
    session: &GameSession,
    class: ShipClass,
    budget: Duration,
) -> Result<u32, GameError> {
    let started = tokio::time::Instant::now();

    loop {
        let available = available_ships(session, class).await?;
        if available > 0 {
            return Ok(available);
        }
        if started.elapsed() > budget {
            tracing::warn!(budget_secs = budget.as_secs(), "fleet wait budget exhausted");
            return Err(GameError::FleetWaitExhausted);
        }

        let wait = match nearest_fleet_eta(session).await? {
            Some(eta) if !eta.is_zero() => eta,
            _ => Duration::from_secs(60),
        };
        // Never sleep past the budget itself.
        let remaining = budget.saturating_sub(started.elapsed()).max(Duration::from_millis(50));
        let wait = wait.min(remaining);
        tracing::info!(wait_secs = wait.as_secs(), class = %class, "no ships free, waiting");
        session.sleep_with_heartbeat(wait).await;
    }
}

#[cfg(test)]
#[path = "naval_tests.rs"]
mod tests;
