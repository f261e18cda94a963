// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ship-route planning and execution.
//!
//! A [`Plan`] is a list of routes plus the ship class that carries them.
//! The [`engine::TransportEngine`] executes a whole plan under one held
//! fleet lock, waiting for ships, splitting cargo into legs, and verifying
//! that the fleet actually shrank by the number of ships dispatched.

pub mod engine;

pub use engine::TransportEngine;

use serde::{Deserialize, Serialize};

use crate::config::{MATERIALS, MATERIALS_COUNT};
use crate::lock::ShipClass;

/// Cargo amounts in canonical resource order.
pub type CargoVector = [i64; MATERIALS_COUNT];

/// One origin→destination shipment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Origin city id.
    pub origin: String,
    /// Destination city id.
    pub destination: String,
    /// Island the destination sits on.
    pub destination_island: String,
    pub cargo: CargoVector,
}

impl Route {
    pub fn total(&self) -> i64 {
        self.cargo.iter().sum()
    }
}

/// A batch of routes sharing one ship class (and therefore one fleet lock).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub routes: Vec<Route>,
    pub ship_class: ShipClass,
}

/// Progression of a single route through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    NeedShips,
    HaveShips,
    LockedAndReadyToSend,
    Sending,
    VerifyingConsumption,
    Delivered,
}

impl RoutePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedShips => "waiting for ships",
            Self::HaveShips => "ships available",
            Self::LockedAndReadyToSend => "lock held, preparing leg",
            Self::Sending => "sending",
            Self::VerifyingConsumption => "verifying fleet consumption",
            Self::Delivered => "delivered",
        }
    }
}

/// Terminal state of one route after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteStatus {
    /// The full cargo vector went out.
    Delivered,
    /// The wait budget ran out before ships or storage freed up.
    WaitBudgetExhausted,
    /// The route died on an error; the message says why.
    Failed(String),
}

/// What actually happened to one route.
#[derive(Debug, Clone)]
pub struct RouteReport {
    pub origin: String,
    pub destination: String,
    pub delivered: CargoVector,
    /// Cargo explicitly given up on (budget exhaustion or failure).
    pub dropped: CargoVector,
    pub ships_used: u32,
    pub status: RouteStatus,
}

/// Per-batch summary returned by the engine.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub routes: Vec<RouteReport>,
}

impl BatchReport {
    pub fn all_delivered(&self) -> bool {
        self.routes.iter().all(|r| r.status == RouteStatus::Delivered)
    }

    /// Total delivered across routes, per resource slot.
    pub fn delivered_totals(&self) -> CargoVector {
        let mut totals = [0i64; MATERIALS_COUNT];
        for route in &self.routes {
            for (slot, amount) in totals.iter_mut().zip(route.delivered) {
                *slot += amount;
            }
        }
        totals
    }
}

/// `1,500 Wood, 200 Wine` style summary for status lines.
pub fn describe_cargo(cargo: &CargoVector) -> String {
    let parts: Vec<String> = cargo
        .iter()
        .enumerate()
        .filter(|(_, amount)| **amount > 0)
        .map(|(i, amount)| format!("{} {}", thousands(*amount), MATERIALS[i]))
        .collect();
    if parts.is_empty() {
        "nothing".to_owned()
    } else {
        parts.join(", ")
    }
}

fn thousands(n: i64) -> String {
    let raw = n.to_string();
    let mut out = String::new();
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
