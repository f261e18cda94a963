// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The module table.
//!
//! Every user-facing job is a record here: a number the menu dispatches on,
//! a section, and a `run` entry point. Module implementations only see a
//! [`ModuleCtx`]; they know nothing about the menu or each other.

pub mod cookie_io;
pub mod task_status;
pub mod transport_manager;

use std::sync::Arc;

use argosy_client::notify::Notify;
use argosy_client::prompt::Prompter;
use argosy_client::session::GameSession;

use crate::worker::BackgroundGate;

/// Menu sections, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Settings,
    Construction,
    Transport,
    Combat,
    Daily,
    Monitoring,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Settings,
        Section::Construction,
        Section::Transport,
        Section::Combat,
        Section::Daily,
        Section::Monitoring,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Settings => "Settings",
            Self::Construction => "Construction",
            Self::Transport => "Transport",
            Self::Combat => "Combat",
            Self::Daily => "Daily",
            Self::Monitoring => "Monitoring",
        }
    }
}

/// Everything a module gets to work with.
pub struct ModuleCtx {
    pub session: Arc<GameSession>,
    pub prompter: Arc<dyn Prompter>,
    pub notifier: Arc<dyn Notify>,
    /// Present in workers; absent when a foreground module runs in the
    /// parent.
    pub gate: Option<Arc<BackgroundGate>>,
}

impl ModuleCtx {
    /// Transition from config to background: detach bookkeeping, registry
    /// entry, handoff signal. No-op in the parent.
    pub fn enter_background(&self, label: &str) -> anyhow::Result<()> {
        match &self.gate {
            Some(gate) => gate.enter(&self.session, label),
            None => Ok(()),
        }
    }

    pub fn world_key(&self) -> String {
        self.session.world.to_string()
    }

    pub fn user_key(&self) -> String {
        self.session.player.clone()
    }
}

pub type ModuleFuture = futures_util::future::BoxFuture<'static, anyhow::Result<()>>;

pub struct ModuleDef {
    pub number: u16,
    pub section: Section,
    pub label: &'static str,
    pub description: &'static str,
    /// Background modules are dispatched into a detached worker; the rest
    /// run inline in the parent.
    pub background: bool,
    pub run: fn(ModuleCtx) -> ModuleFuture,
}

/// All dispatchable modules, ascending by number.
pub fn registered_modules() -> Vec<ModuleDef> {
    vec![
        ModuleDef {
            number: 5,
            section: Section::Settings,
            label: "Cookie Import/Export",
            description: "Move the game session into or out of a browser",
            background: false,
            run: cookie_io::run,
        },
        ModuleDef {
            number: 30,
            section: Section::Transport,
            label: transport_manager::LABEL,
            description: "Scheduled resource shipments between cities",
            background: true,
            run: transport_manager::run,
        },
        ModuleDef {
            number: 50,
            section: Section::Monitoring,
            label: "Task Status",
            description: "Health of background workers, restart or kill",
            background: false,
            run: task_status::run,
        },
    ]
}

pub fn find_module(number: u16) -> Option<ModuleDef> {
    registered_modules().into_iter().find(|m| m.number == number)
}

pub fn find_module_by_label(label: &str) -> Option<ModuleDef> {
    registered_modules().into_iter().find(|m| m.label == label)
}

#[cfg(test)]
#[path = "modules_tests.rs"]
mod tests;
