// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure parsers for game pages and page-state markers.
//!
//! The game speaks HTML with JSON islands embedded in inline script, so
//! structured data comes out via regex. That is inherent to the protocol;
//! all of it is confined to this module and every extraction has an explicit
//! failure mode instead of a default-zero fallback where the caller needs
//! to distinguish.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MATERIALS_COUNT;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The expected JSON island was not present in the page.
    #[error("{what} not found in page")]
    Missing { what: &'static str },

    /// The JSON island was present but did not deserialize.
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
}

fn captures<'h>(pattern: &str, hay: &'h str) -> Option<regex::Captures<'h>> {
    Regex::new(pattern).ok()?.captures(hay)
}

// ── Page-state markers ──────────────────────────────────────────────────

/// True when the response is the logged-out page.
pub fn is_expired(html: &str) -> bool {
    html.contains("index.php?logout") || html.contains(r#"<a class="logout""#)
}

/// True when the account sits in vacation mode.
pub fn is_vacation(html: &str) -> bool {
    html.contains("nologin_umod")
}

/// True when the server is running its backup/maintenance window.
///
/// Two shapes exist: a page containing the `backupLockTimer` widget, and an
/// AJAX body that consists solely of a type-11 `provideFeedback` array.
pub fn is_maintenance(html: &str) -> bool {
    if html.contains("backupLockTimer") {
        return true;
    }
    Regex::new(r#"^\[\["provideFeedback",\[\{"location":1,"type":11,"text":[\s\S]*\}\]\]\]$"#)
        .map(|re| re.is_match(html.trim()))
        .unwrap_or(false)
}

/// Marker the server emits when the submitted action-request token is stale.
pub fn is_stale_token(body: &str) -> bool {
    body.contains("TXT_ERROR_WRONG_REQUEST_ID")
}

/// Replace `uXXXX` escape sequences left over from double-encoded JSON.
pub fn decode_unicode_escapes(input: &str) -> String {
    let Ok(re) = Regex::new(r"u([0-9a-fA-F]{4})") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_owned())
    })
    .into_owned()
}

// ── City view ───────────────────────────────────────────────────────────

/// A city as needed by the transport engine: identity, ownership, stock,
/// and free storage. Building positions are out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub island_id: String,
    pub x: i32,
    pub y: i32,
    /// True when the page was rendered for one of the player's own cities
    /// (foreign cities expose no storage figures).
    pub own: bool,
    /// Current stock per canonical resource slot.
    pub resources: [i64; MATERIALS_COUNT],
    /// Total warehouse capacity (identical across slots).
    pub storage_capacity: i64,
    /// Stock parked in branch-office sale listings, per slot.
    pub listed_for_sale: [i64; MATERIALS_COUNT],
}

impl City {
    /// Free storage per slot: capacity minus stock minus sale listings.
    pub fn free_space(&self) -> [i64; MATERIALS_COUNT] {
        let mut out = [0i64; MATERIALS_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.storage_capacity - self.resources[i] - self.listed_for_sale[i];
        }
        out
    }
}

/// Parse a `view=city` page.
pub fn parse_city(html: &str) -> Result<City, ParseError> {
    let raw = captures(r#""updateBackgroundData",\s?([\s\S]*?)\],\["updateTemplateData""#, html)
        .and_then(|c| c.get(1))
        .ok_or(ParseError::Missing { what: "city data" })?;

    let data: serde_json::Value = serde_json::from_str(raw.as_str())
        .map_err(|e| ParseError::Malformed { what: "city data", detail: e.to_string() })?;

    let id = json_string(&data, "id").ok_or(ParseError::Missing { what: "city id" })?;
    let island_id =
        json_string(&data, "islandId").ok_or(ParseError::Missing { what: "island id" })?;
    let name = decode_unicode_escapes(&json_string(&data, "name").unwrap_or_default());
    let x = json_i64(&data, "islandXCoord").unwrap_or(0) as i32;
    let y = json_i64(&data, "islandYCoord").unwrap_or(0) as i32;

    Ok(City {
        id,
        name,
        island_id,
        x,
        y,
        own: true,
        resources: parse_available_resources(html),
        storage_capacity: parse_warehouse_capacity(html),
        listed_for_sale: parse_listed_for_sale(html),
    })
}

/// Current stock in canonical order. The page carries the slots keyed by
/// tradegood number (`2`=marble, `1`=wine, `4`=sulfur, `3`=crystal).
fn parse_available_resources(html: &str) -> [i64; MATERIALS_COUNT] {
    let Some(c) = captures(
        r#"\\"resource\\":(\d+),\\"2\\":(\d+),\\"1\\":(\d+),\\"4\\":(\d+),\\"3\\":(\d+)\}"#,
        html,
    ) else {
        return [0; MATERIALS_COUNT];
    };
    let g = |i: usize| c.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    [g(1), g(3), g(2), g(5), g(4)]
}

fn parse_warehouse_capacity(html: &str) -> i64 {
    captures(r#"maxResources:\s*JSON\.parse\('\{\\"resource\\":(\d+),"#, html)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn parse_listed_for_sale(html: &str) -> [i64; MATERIALS_COUNT] {
    let Some(c) = captures(
        r#"branchOfficeResources: JSON\.parse\('\{\\"resource\\":\\"(\d+)\\",\\"1\\":\\"(\d+)\\",\\"2\\":\\"(\d+)\\",\\"3\\":\\"(\d+)\\",\\"4\\":\\"(\d+)\\"\}'\)"#,
        html,
    ) else {
        return [0; MATERIALS_COUNT];
    };
    let g = |i: usize| c.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    [g(1), g(2), g(3), g(4), g(5)]
}

// ── Island view ─────────────────────────────────────────────────────────

/// A city slot on an island, as listed by the island view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IslandCity {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Island {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    /// Tradegood number produced on this island.
    pub tradegood: String,
    pub cities: Vec<IslandCity>,
}

/// Parse a `view=island` page.
pub fn parse_island(html: &str) -> Result<Island, ParseError> {
    let raw = captures(r#"ajax\.Responder, (\[\[[\S\s]*?\]\])\);"#, html)
        .and_then(|c| c.get(1))
        .ok_or(ParseError::Missing { what: "island data" })?;

    let outer: serde_json::Value = serde_json::from_str(raw.as_str())
        .map_err(|e| ParseError::Malformed { what: "island data", detail: e.to_string() })?;

    let data = outer
        .get(1)
        .and_then(|v| v.get(1))
        .ok_or(ParseError::Malformed { what: "island data", detail: "shape".to_owned() })?;

    let cities = data
        .get("cities")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|c| {
                    if !c.is_object() {
                        return None;
                    }
                    let id = json_string(c, "id")?;
                    Some(IslandCity {
                        id,
                        name: decode_unicode_escapes(&json_string(c, "name").unwrap_or_default()),
                        owner_id: json_string(c, "ownerId"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Island {
        id: json_string(data, "id").ok_or(ParseError::Missing { what: "island id" })?,
        name: decode_unicode_escapes(&json_string(data, "name").unwrap_or_default()),
        x: json_i64(data, "xCoord").unwrap_or(0) as i32,
        y: json_i64(data, "yCoord").unwrap_or(0) as i32,
        tradegood: json_string(data, "tradegood").unwrap_or_default(),
        cities,
    })
}

// ── JSON helpers ────────────────────────────────────────────────────────

/// Read a field that the game serializes sometimes as a string and
/// sometimes as a number.
pub(crate) fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_i64(value: &serde_json::Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
