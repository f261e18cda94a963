// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Menu rendering. Pure string builders so the shell loop stays small and
//! the layout is testable.

use crate::mailbox::CriticalError;
use crate::modules::{ModuleDef, Section};

/// Menu number of the auto-loader screen (lives in the shell, not in the
/// module table, because it drives recording and dispatch).
pub const AUTO_LOADER_NUMBER: u16 = 4;

pub fn render_banner(player: &str, world: &str, world_name: &str) -> String {
    format!("\n  ARGOSY — {player} on {world} ({world_name})\n  {}\n", "=".repeat(50))
}

/// Sectioned module menu with the auto-loader entry injected under
/// Settings and `0` reserved for leaving the account.
pub fn render_module_menu(modules: &[ModuleDef]) -> String {
    let mut out = String::new();
    for section in Section::ALL {
        let mut lines: Vec<String> = modules
            .iter()
            .filter(|m| m.section == section)
            .map(|m| format!("    ({}) {} — {}", m.number, m.label, m.description))
            .collect();
        if section == Section::Settings {
            lines.push(format!(
                "    ({AUTO_LOADER_NUMBER}) Auto Loader — Saved configs, auto-start on login"
            ));
            lines.sort();
        }
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("  {}\n", section.label()));
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push_str("    (0) Log out of this account\n");
    out
}

/// Pending worker errors, rendered above the menu.
pub fn render_errors(errors: &[CriticalError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n  !! Background task errors:\n");
    for error in errors {
        out.push_str(&format!("  !! [{}] pid {}: {}\n", error.module, error.pid, error.message));
    }
    out
}

#[cfg(test)]
#[path = "menu_tests.rs"]
mod tests;
