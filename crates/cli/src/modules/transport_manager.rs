// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled resource shipments.
//!
//! Config phase: routes (origin, destination, island, cargo amounts), ship
//! class, and an optional repeat interval. Background phase: execute the
//! plan through the transport engine, report, sleep, repeat.

use std::sync::Arc;

use argosy_client::config::MATERIALS;
use argosy_client::lock::ShipClass;
use argosy_client::notify::Notify;
use argosy_client::prompt::Prompter;
use argosy_client::session::GameSession;
use argosy_client::transport::{
    describe_cargo, CargoVector, Plan, Route, RouteStatus, TransportEngine,
};

use crate::mailbox::CriticalErrorMailbox;
use crate::supervisor::{supervise, RestartPolicy};

use super::{ModuleCtx, ModuleFuture};

pub const LABEL: &str = "Transport Manager";

#[derive(Debug, Clone)]
struct JobConfig {
    plan: Plan,
    /// Hours between batches; zero means run once.
    interval_hours: i64,
}

pub fn run(ctx: ModuleCtx) -> ModuleFuture {
    Box::pin(async move {
        let config = configure(&*ctx.prompter);
        ctx.enter_background(LABEL)?;

        let session = Arc::clone(&ctx.session);
        let notifier = Arc::clone(&ctx.notifier);
        let mailbox = CriticalErrorMailbox::new(&ctx.world_key(), &ctx.user_key());

        supervise(LABEL, &RestartPolicy::default(), &*ctx.notifier, &mailbox, move || {
            let session = Arc::clone(&session);
            let notifier = Arc::clone(&notifier);
            let config = config.clone();
            async move { run_batches(&session, &notifier, &config).await }
        })
        .await
    })
}

async fn run_batches(
    session: &GameSession,
    notifier: &Arc<dyn Notify>,
    config: &JobConfig,
) -> anyhow::Result<()> {
    loop {
        session.set_status("Starting transport batch");
        let engine = TransportEngine::new(session, &**notifier);
        let report = engine.execute(&config.plan).await?;

        for route in &report.routes {
            match &route.status {
                RouteStatus::Delivered => {
                    let _ = notifier
                        .send(
                            &format!(
                                "SHIPMENT SENT\nFrom: {}\nTo: {}\nSent: {} ({} ships)",
                                route.origin,
                                route.destination,
                                describe_cargo(&route.delivered),
                                route.ships_used
                            ),
                            None,
                        )
                        .await;
                }
                RouteStatus::WaitBudgetExhausted => {
                    let _ = notifier
                        .send(
                            &format!(
                                "SHIPMENT DELAYED\nFrom: {}\nTo: {}\nDropped: {}",
                                route.origin,
                                route.destination,
                                describe_cargo(&route.dropped)
                            ),
                            None,
                        )
                        .await;
                }
                // Engine already notified about failures.
                RouteStatus::Failed(_) => {}
            }
        }

        if config.interval_hours == 0 {
            session.set_status("Transport batch complete");
            return Ok(());
        }

        session.set_status(&format!(
            "[PAUSED] next transport batch in {}h",
            config.interval_hours
        ));
        session
            .sleep_with_heartbeat(std::time::Duration::from_secs(
                config.interval_hours as u64 * 3600,
            ))
            .await;
    }
}

// ── Config phase ────────────────────────────────────────────────────────

fn configure(prompter: &dyn Prompter) -> JobConfig {
    println!("\n  Configure scheduled shipments.\n");

    let ship_class = if prompter.confirm("  Use freighters instead of merchant ships?", false) {
        ShipClass::Freighter
    } else {
        ShipClass::Merchant
    };

    let route_count = prompter.read_choice("  How many routes? ", 1, 20);
    let mut routes = Vec::with_capacity(route_count as usize);
    for n in 1..=route_count {
        println!("  Route {n}:");
        let origin = read_id(prompter, "    Origin city id: ");
        let destination = read_id(prompter, "    Destination city id: ");
        let destination_island = read_id(prompter, "    Destination island id: ");
        let mut cargo: CargoVector = [0; MATERIALS.len()];
        for (i, name) in MATERIALS.iter().enumerate() {
            cargo[i] = read_amount(prompter, &format!("    {name} to send: "));
        }
        routes.push(Route { origin, destination, destination_island, cargo });
    }

    let interval_hours =
        prompter.read_choice("  Repeat interval in hours (0 = run once): ", 0, 168);

    JobConfig { plan: Plan { routes, ship_class }, interval_hours }
}

fn read_id(prompter: &dyn Prompter, prompt: &str) -> String {
    for _ in 0..3 {
        let raw = prompter.read_line(prompt);
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            return raw;
        }
        println!("    Please enter a numeric id.");
    }
    String::new()
}

/// Amounts accept thousands separators (`1,500` or `1.500`).
fn read_amount(prompter: &dyn Prompter, prompt: &str) -> i64 {
    for _ in 0..3 {
        let raw = prompter.read_line(prompt);
        let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if raw.is_empty() {
            return 0;
        }
        if let Ok(value) = cleaned.parse::<i64>() {
            return value;
        }
        println!("    Please enter an amount.");
    }
    0
}

#[cfg(test)]
#[path = "transport_manager_tests.rs"]
mod tests;
