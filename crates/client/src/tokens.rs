// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action-request token and current-city cache.
//!
//! The server embeds a fresh CSRF value (`actionRequest`) in most responses
//! and rejects mutating requests that echo a stale one. Every response body
//! that passes through the session is offered to `try_extract`, so the next
//! POST can reuse the newest observed token without an extra round trip.

use parking_lot::Mutex;
use regex::Regex;

const TOKEN_PATTERN: &str = r#"actionRequest"?:\s*"(.*?)""#;
const CITY_PATTERN: &str = r"currentCityId:\s*(\d+)";

pub struct TokenCache {
    csrf: Mutex<String>,
    city: Mutex<String>,
    token_re: Option<Regex>,
    city_re: Option<Regex>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            csrf: Mutex::new(String::new()),
            city: Mutex::new(String::new()),
            token_re: Regex::new(TOKEN_PATTERN).ok(),
            city_re: Regex::new(CITY_PATTERN).ok(),
        }
    }

    /// Offer a response body; the token field, the city field, both, or
    /// neither may update. Never performs I/O.
    pub fn try_extract(&self, body: &str) {
        if let Some(m) = self.token_re.as_ref().and_then(|re| re.captures(body)) {
            if let Some(value) = m.get(1) {
                *self.csrf.lock() = value.as_str().to_owned();
            }
        }
        if let Some(m) = self.city_re.as_ref().and_then(|re| re.captures(body)) {
            if let Some(value) = m.get(1) {
                *self.city.lock() = value.as_str().to_owned();
            }
        }
    }

    /// The newest observed token, or `None` if nothing has been seen (or
    /// the cache was invalidated).
    pub fn csrf(&self) -> Option<String> {
        let token = self.csrf.lock();
        if token.is_empty() {
            None
        } else {
            Some(token.clone())
        }
    }

    /// Clear the token so the next POST repopulates via a fresh GET.
    pub fn invalidate_csrf(&self) {
        self.csrf.lock().clear();
    }

    /// The city id the server currently considers active.
    pub fn current_city(&self) -> Option<String> {
        let city = self.city.lock();
        if city.is_empty() {
            None
        } else {
            Some(city.clone())
        }
    }

    /// Seed both fields, e.g. when reconstructing a session in a worker.
    pub fn seed(&self, csrf: &str, city: &str) {
        *self.csrf.lock() = csrf.to_owned();
        *self.city.lock() = city.to_owned();
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
