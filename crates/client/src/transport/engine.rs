// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executes a transport plan against the game.
//!
//! The engine makes no direct HTTP calls — everything goes through the
//! session, which owns the rate limit and the recovery loops. What the
//! engine owns: the fleet lock, the leg arithmetic, busy-fleet waits, and
//! the consumption check after every dispatch.

use std::time::Duration;

use crate::config::{ACTION_REQUEST_PLACEHOLDER, CITY_VIEW, MATERIALS_COUNT};
use crate::error::GameError;
use crate::lock::{FleetLock, ShipClass};
use crate::naval;
use crate::notify::Notify;
use crate::parse::{self, City};
use crate::session::{GameSession, Params};

use super::{
    describe_cargo, BatchReport, CargoVector, Plan, Route, RoutePhase, RouteReport, RouteStatus,
};

pub struct TransportEngine<'a> {
    session: &'a GameSession,
    notifier: &'a dyn Notify,
}

impl<'a> TransportEngine<'a> {
    pub fn new(session: &'a GameSession, notifier: &'a dyn Notify) -> Self {
        Self { session, notifier }
    }

    /// Execute every route in the plan under one held fleet lock.
    ///
    /// Lock acquisition failure (after the configured retries) aborts the
    /// whole batch; individual route failures are recorded in the report
    /// and the remaining routes still run.
    pub async fn execute(&self, plan: &Plan) -> Result<BatchReport, GameError> {
        let tunables = self.session.tunables();
        let mut lock = FleetLock::new(
            &self.session.world.to_string(),
            &self.session.player,
            plan.ship_class,
            tunables,
        );

        self.acquire_with_retries(&mut lock).await?;
        let report = self.run_routes(plan).await;
        lock.release();
        Ok(report)
    }

    async fn acquire_with_retries(&self, lock: &mut FleetLock) -> Result<(), GameError> {
        let tunables = self.session.tunables();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.session.set_status(&format!(
                "Waiting for shipping lock (attempt {attempt}/{})",
                tunables.lock_attempts
            ));
            match lock.acquire(tunables.lock_timeout()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= tunables.lock_attempts => {
                    let _ = self
                        .notifier
                        .send(
                            &format!(
                                "Could not acquire the shipping lock after {attempt} attempts; \
                                 skipping this batch.",
                            ),
                            None,
                        )
                        .await;
                    return Err(e);
                }
                Err(_) => {
                    tracing::warn!(attempt, "shipping lock busy, retrying");
                    tokio::time::sleep(Duration::from_secs(tunables.lock_retry_delay_secs)).await;
                }
            }
        }
    }

    async fn run_routes(&self, plan: &Plan) -> BatchReport {
        let mut report = BatchReport::default();
        let capacity = match naval::class_capacity(self.session, plan.ship_class).await {
            Ok(c) => c.max(1),
            Err(e) => {
                tracing::warn!(err = %e, "could not read ship capacity, using default");
                500
            }
        };

        for route in &plan.routes {
            let outcome = self.execute_route(route, plan.ship_class, capacity).await;
            if let RouteStatus::Failed(ref reason) = outcome.status {
                let _ = self
                    .notifier
                    .send(
                        &format!(
                            "SHIPMENT FAILED\nFrom: {}\nTo: {}\nError: {}",
                            route.origin, route.destination, reason
                        ),
                        None,
                    )
                    .await;
            }
            report.routes.push(outcome);
        }
        report
    }

    /// Drive one route to completion (or give up on it).
    async fn execute_route(
        &self,
        route: &Route,
        class: ShipClass,
        capacity: u32,
    ) -> RouteReport {
        let mut remaining = route.cargo;
        let mut delivered = [0i64; MATERIALS_COUNT];
        let mut ships_used = 0u32;
        let wait_budget = self.session.tunables().fleet_wait_budget();
        let route_started = tokio::time::Instant::now();

        while remaining.iter().any(|&r| r > 0) {
            if route_started.elapsed() > wait_budget {
                tracing::warn!(
                    origin = %route.origin,
                    destination = %route.destination,
                    "route wait budget exhausted, dropping the rest"
                );
                return RouteReport {
                    origin: route.origin.clone(),
                    destination: route.destination.clone(),
                    delivered,
                    dropped: remaining,
                    ships_used,
                    status: RouteStatus::WaitBudgetExhausted,
                };
            }

            // Each leg gets whatever is left of the one route-level wait
            // budget, not a fresh allowance of its own.
            let budget_left = wait_budget.saturating_sub(route_started.elapsed());
            match self.execute_leg(route, class, capacity, &mut remaining, budget_left).await {
                Ok(Some(leg)) => {
                    for (slot, amount) in delivered.iter_mut().zip(leg.sent) {
                        *slot += amount;
                    }
                    ships_used += leg.ships;
                }
                // Destination full; already slept inside.
                Ok(None) => {}
                Err(e) => {
                    return RouteReport {
                        origin: route.origin.clone(),
                        destination: route.destination.clone(),
                        delivered,
                        dropped: remaining,
                        ships_used,
                        status: match e {
                            GameError::FleetWaitExhausted => RouteStatus::WaitBudgetExhausted,
                            other => RouteStatus::Failed(other.to_string()),
                        },
                    };
                }
            }
        }

        self.set_route_status(route, RoutePhase::Delivered, &describe_cargo(&delivered));
        RouteReport {
            origin: route.origin.clone(),
            destination: route.destination.clone(),
            delivered,
            dropped: [0; MATERIALS_COUNT],
            ships_used,
            status: RouteStatus::Delivered,
        }
    }

    /// One leg: wait for ships, size the cargo, dispatch, verify.
    ///
    /// Returns `Ok(None)` when the destination had no free storage (after
    /// the saturation sleep), otherwise what went out.
    async fn execute_leg(
        &self,
        route: &Route,
        class: ShipClass,
        capacity: u32,
        remaining: &mut CargoVector,
        wait_budget: Duration,
    ) -> Result<Option<Leg>, GameError> {
        self.set_route_status(route, RoutePhase::NeedShips, "");
        let ships_before = naval::wait_for_arrival(self.session, class, wait_budget).await?;
        self.set_route_status(
            route,
            RoutePhase::HaveShips,
            &format!("{ships_before} {} free", class.label()),
        );

        // Fresh city state on both ends; stock and storage move constantly.
        let origin = self.fetch_city(&route.origin).await?;
        let destination = self.fetch_city(&route.destination).await?;
        // The game answers a foreign city id with the current own city, so
        // an id mismatch means the destination is not ours and storage is
        // unknown (send blind).
        let destination_owned = destination.id == route.destination;
        let destination_free = destination.free_space();

        let mut storage_in_ships = i64::from(ships_before) * i64::from(capacity);
        let mut send = [0i64; MATERIALS_COUNT];
        for i in 0..MATERIALS_COUNT {
            let mut amount = remaining[i].min(origin.resources[i]).min(storage_in_ships);
            if destination_owned {
                amount = amount.min(destination_free[i].max(0));
            }
            send[i] = amount.max(0);
            storage_in_ships -= send[i];
        }

        let total: i64 = send.iter().sum();
        if total == 0 {
            self.set_route_status(route, RoutePhase::LockedAndReadyToSend, "destination full");
            tracing::info!(
                destination = %route.destination,
                "no space or stock for this leg, sleeping"
            );
            self.session
                .sleep_with_heartbeat(Duration::from_secs(
                    self.session.tunables().destination_full_wait_secs,
                ))
                .await;
            return Ok(None);
        }

        let cap = i64::from(capacity);
        let ships_needed = ((total + cap - 1) / cap) as u32;
        self.set_route_status(
            route,
            RoutePhase::Sending,
            &format!("{} with {} ships", describe_cargo(&send), ships_needed),
        );
        self.dispatch(route, class, ships_needed, &send, &origin).await?;

        // The fleet must have shrunk by what the dispatch consumed; fewer
        // means the transport silently did not happen.
        self.set_route_status(route, RoutePhase::VerifyingConsumption, "");
        let ships_after = naval::available_ships(self.session, class).await?;
        let consumed = ships_before.saturating_sub(ships_after);
        if consumed < ships_needed {
            return Err(GameError::ShipsNotConsumed {
                expected: ships_needed,
                observed: consumed,
            });
        }

        for i in 0..MATERIALS_COUNT {
            remaining[i] -= send[i];
        }
        Ok(Some(Leg { sent: send, ships: ships_needed }))
    }

    /// Issue the actual transport request, handling busy fleets and
    /// unexpected bodies with bounded retries.
    async fn dispatch(
        &self,
        route: &Route,
        class: ShipClass,
        ships: u32,
        send: &CargoVector,
        origin: &City,
    ) -> Result<(), GameError> {
        let max_retries = self.session.tunables().send_max_retries;
        let mut last_detail = String::new();

        for attempt in 1..=max_retries {
            let current_city = self
                .session
                .tokens()
                .current_city()
                .unwrap_or_else(|| origin.id.clone());

            // Switch the active city to the origin first; the transport
            // form posts against the current city.
            let switch: Params = vec![
                ("action".to_owned(), "header".to_owned()),
                ("function".to_owned(), "changeCurrentCity".to_owned()),
                ("actionRequest".to_owned(), ACTION_REQUEST_PLACEHOLDER.to_owned()),
                ("oldView".to_owned(), "city".to_owned()),
                ("cityId".to_owned(), route.origin.clone()),
                ("backgroundView".to_owned(), "city".to_owned()),
                ("currentCityId".to_owned(), current_city),
                ("ajax".to_owned(), "1".to_owned()),
            ];
            self.session.post_with("", &[], &switch, Default::default()).await?;

            let mut form: Params = vec![
                ("action".to_owned(), "transportOperations".to_owned()),
                ("function".to_owned(), "loadTransportersWithFreight".to_owned()),
                ("destinationCityId".to_owned(), route.destination.clone()),
                ("islandId".to_owned(), route.destination_island.clone()),
                ("oldView".to_owned(), String::new()),
                ("position".to_owned(), String::new()),
                ("avatar2Name".to_owned(), String::new()),
                ("city2Name".to_owned(), String::new()),
                ("type".to_owned(), String::new()),
                ("activeTab".to_owned(), String::new()),
                ("transportDisplayPrice".to_owned(), "0".to_owned()),
                ("premiumTransporter".to_owned(), "0".to_owned()),
                ("capacity".to_owned(), "5".to_owned()),
                ("max_capacity".to_owned(), "5".to_owned()),
                ("jetPropulsion".to_owned(), "0".to_owned()),
                ("backgroundView".to_owned(), "city".to_owned()),
                ("currentCityId".to_owned(), route.origin.clone()),
                ("templateView".to_owned(), "transport".to_owned()),
                ("currentTab".to_owned(), "tabSendTransporter".to_owned()),
                ("actionRequest".to_owned(), ACTION_REQUEST_PLACEHOLDER.to_owned()),
                ("ajax".to_owned(), "1".to_owned()),
            ];
            match class {
                ShipClass::Merchant => {
                    form.push(("transporters".to_owned(), ships.to_string()));
                }
                ShipClass::Freighter => {
                    form.push(("usedFreightersShips".to_owned(), ships.to_string()));
                    form.push(("transporters".to_owned(), "0".to_owned()));
                }
            }
            for (i, amount) in send.iter().enumerate() {
                if *amount > 0 {
                    let key = if i == 0 {
                        "cargo_resource".to_owned()
                    } else {
                        format!("cargo_tradegood{i}")
                    };
                    form.push((key, amount.to_string()));
                }
            }

            let body = self.session.post_with("", &[], &form, Default::default()).await?;
            match feedback_type(&body) {
                Some(10) => return Ok(()),
                Some(11) => {
                    // Fleet busy: wait for the nearest return and retry.
                    let wait = naval::nearest_fleet_eta(self.session)
                        .await?
                        .filter(|d| !d.is_zero())
                        .unwrap_or(Duration::from_secs(60));
                    tracing::info!(wait_secs = wait.as_secs(), "ships busy, waiting before retry");
                    self.session.sleep_with_heartbeat(wait).await;
                }
                other => {
                    last_detail = match other {
                        Some(code) => format!("feedback type {code}"),
                        None => preview(&body),
                    };
                    tracing::warn!(attempt, detail = %last_detail, "unexpected transport response");
                    tokio::time::sleep(Duration::from_secs(5.min(
                        self.session.tunables().lock_poll_secs.max(1),
                    )))
                    .await;
                }
            }
        }

        Err(GameError::RouteUnexpectedResponse { attempts: max_retries, detail: last_detail })
    }

    async fn fetch_city(&self, city_id: &str) -> Result<City, GameError> {
        let html = self.session.get(&format!("{CITY_VIEW}{city_id}")).await?;
        Ok(parse::parse_city(&html)?)
    }

    fn set_route_status(&self, route: &Route, phase: RoutePhase, detail: &str) {
        let status = if detail.is_empty() {
            format!("{} -> {} | {}", route.origin, route.destination, phase.as_str())
        } else {
            format!("{} -> {} | {}: {}", route.origin, route.destination, phase.as_str(), detail)
        };
        self.session.set_status(&status);
    }
}

struct Leg {
    sent: CargoVector,
    ships: u32,
}

/// The first feedback code of a game AJAX response (`resp[3][1][0].type`).
fn feedback_type(body: &str) -> Option<i64> {
    let data: serde_json::Value = serde_json::from_str(body).ok()?;
    data.get(3)?.get(1)?.get(0)?.get("type")?.as_i64()
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 120 {
        let cut: String = trimmed.chars().take(120).collect();
        format!("{cut}…")
    } else {
        trimmed.to_owned()
    }
}
