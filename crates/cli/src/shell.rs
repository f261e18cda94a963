// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interactive parent shell: passphrase, account roster, login, and
//! the per-account menu loop that dispatches modules and shows worker
//! errors.

use std::sync::Arc;

use argosy_client::account::{Account, ProxyConfig, WorldId};
use argosy_client::config::Tunables;
use argosy_client::login::{self, captcha::SolverChain};
use argosy_client::prompt::Prompter;
use argosy_client::session::{GameSession, SessionDeps};

use crate::accounts::{self, AccountStore};
use crate::autoload::{AutoLoadEntry, AutoLoaderStore};
use crate::config::Config;
use crate::mailbox::CriticalErrorMailbox;
use crate::menu;
use crate::modules::{self, ModuleCtx};
use crate::prompts::{take_recorded_inputs, TerminalPrompter};
use crate::registry::{ProcessRegistry, FROZEN_THRESHOLD};
use crate::supervisor;

/// Parent entry point: account roster loop.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let prompter: Arc<dyn Prompter> = Arc::new(TerminalPrompter);
    let store = AccountStore::in_dir(&config.data_dir());

    let passphrase = match accounts::passphrase_from_environment() {
        Some(passphrase) => passphrase,
        None => prompter.read_password("  Master passphrase: "),
    };
    let mut roster = store.load(&passphrase)?;

    loop {
        println!("\n  ACCOUNTS");
        let lines = accounts::summaries(&roster);
        for (i, line) in lines.iter().enumerate() {
            println!("  ({}) {}", i + 1, line);
        }
        let add = lines.len() + 1;
        let remove = lines.len() + 2;
        println!("  ({add}) Add account");
        println!("  ({remove}) Remove account");
        println!("  (0) Quit");

        let choice = prompter.read_choice("  Select: ", 0, remove as i64) as usize;
        match choice {
            0 => return Ok(()),
            c if c == add => {
                roster.push(add_account_flow(&*prompter));
                store.save(&roster, &passphrase)?;
            }
            c if c == remove => {
                if roster.is_empty() {
                    continue;
                }
                let pick = prompter.read_choice(
                    "  Remove which account? (0 cancels): ",
                    0,
                    roster.len() as i64,
                );
                if pick > 0 {
                    let removed = roster.remove((pick - 1) as usize);
                    store.save(&roster, &passphrase)?;
                    println!("  Removed {}.", removed.email);
                }
            }
            c if c <= lines.len() => {
                let index = c - 1;
                if let Err(e) = account_shell(
                    config,
                    &store,
                    &mut roster,
                    index,
                    &passphrase,
                    Arc::clone(&prompter),
                )
                .await
                {
                    tracing::error!(err = %format!("{e:#}"), "account session ended with an error");
                    println!("  Session error: {e:#}");
                }
            }
            _ => {}
        }
    }
}

fn add_account_flow(prompter: &dyn Prompter) -> Account {
    let email = prompter.read_line("  Email: ");
    let secret = prompter.read_password("  Password: ");
    let mut account = Account::new(email, secret);

    let world = prompter.read_line("  Default world (like s59-en, empty to pick at login): ");
    if let Some(world) = WorldId::parse(&world) {
        account.known_worlds.push(world.clone());
        account.default_world = Some(world);
    }

    if prompter.confirm("  Configure a proxy for this account?", false) {
        let host = prompter.read_line("    Proxy host: ");
        let port = prompter.read_choice("    Proxy port: ", 1, 65535) as u16;
        let username = prompter.read_line("    Proxy username (empty for none): ");
        let password = if username.is_empty() {
            String::new()
        } else {
            prompter.read_password("    Proxy password: ")
        };
        account.proxy = Some(ProxyConfig { host, port, username, password });
        account.proxy_auto = prompter.confirm("    Activate it automatically after login?", true);
    }

    account
}

/// Login, auto-launch saved jobs, then the per-account menu loop.
async fn account_shell(
    config: &Config,
    store: &AccountStore,
    roster: &mut [Account],
    index: usize,
    passphrase: &str,
    prompter: Arc<dyn Prompter>,
) -> anyhow::Result<()> {
    let account = roster[index].clone();
    let solver = Arc::new(SolverChain::standard(
        config.endpoints().solver_api.as_deref(),
        true,
        Arc::clone(&prompter),
    ));

    println!("  Logging in {}...", account.email);
    let ctx = login::Context {
        endpoints: config.endpoints(),
        tunables: Tunables::default(),
        interactive: true,
        prompter: &*prompter,
        solver: &*solver,
        preselected_world: account.preferred_world().cloned(),
    };
    let result = login::run(&account, &ctx).await?;

    // Persist the refreshed tokens and any newly learned world.
    {
        let stored = &mut roster[index];
        stored.cached_auth_token = result.auth_token.clone();
        stored.cached_device_token = result.device_token.clone();
        if !stored.known_worlds.contains(&result.world) {
            stored.known_worlds.push(result.world.clone());
        }
        store.save(roster, passphrase)?;
    }

    let world = result.world.to_string();
    let user = result.player.clone();
    let world_name = result.world_name.clone();
    let session = GameSession::from_login(
        result,
        roster[index].clone(),
        SessionDeps {
            endpoints: config.endpoints(),
            tunables: Tunables::default(),
            prompter: Arc::clone(&prompter),
            solver,
        },
    );
    session.start_health_pinger();

    let registry = ProcessRegistry::new(&world, &user, FROZEN_THRESHOLD);
    let mailbox = CriticalErrorMailbox::new(&world, &user);
    let autoload = AutoLoaderStore::new(&world, &user);

    launch_saved(&autoload, &registry, &session);

    loop {
        print!("{}", menu::render_errors(&mailbox.drain()));
        print!("{}", menu::render_banner(&user, &world, &world_name));
        print!("{}", menu::render_module_menu(&modules::registered_modules()));

        let choice = prompter.read_choice("  Select: ", 0, 99) as u16;
        if choice == 0 {
            break;
        }
        if choice == menu::AUTO_LOADER_NUMBER {
            autoloader_screen(&autoload, &registry, &session, &prompter).await;
            continue;
        }

        let Some(module) = modules::find_module(choice) else {
            println!("  No module with number {choice}.");
            continue;
        };
        if module.background {
            match supervisor::dispatch(&module, &session, None, false).await {
                Ok(pid) => {
                    println!("  {} is running in the background as PID {pid}.", module.label)
                }
                Err(e) => println!("  Could not start {}: {e:#}", module.label),
            }
        } else {
            let ctx = ModuleCtx {
                session: Arc::clone(&session),
                prompter: Arc::clone(&prompter),
                notifier: config.notifier(),
                gate: None,
            };
            if let Err(e) = (module.run)(ctx).await {
                println!("  {} failed: {e:#}", module.label);
            }
        }
    }

    session.close();
    Ok(())
}

/// Spawn every enabled saved config that has no healthy worker.
fn launch_saved(autoload: &AutoLoaderStore, registry: &ProcessRegistry, session: &GameSession) {
    let report = autoload.launch_enabled(registry, |entry| spawn_entry(session, entry));
    for (name, pid) in &report.launched {
        println!("  Auto-loaded {name} (PID {pid}).");
    }
    for (name, pids) in &report.frozen_warned {
        println!(
            "  WARNING: {name} has no heartbeat in over 10 minutes (PIDs {pids:?}); \
             a replacement was launched. Use the task status screen to kill the stale one."
        );
    }
    for name in &report.failed {
        println!("  Auto-load of {name} failed; see the log.");
    }
}

/// Bridge the sync launch-policy callback to the async dispatcher.
fn spawn_entry(session: &GameSession, entry: &AutoLoadEntry) -> anyhow::Result<u32> {
    let module = modules::find_module(entry.module_number)
        .ok_or_else(|| anyhow::anyhow!("module {} is not registered", entry.module_number))?;
    tokio::task::block_in_place(|| {
        tokio::runtime::Handle::current()
            .block_on(supervisor::dispatch(&module, session, Some(&entry.recorded_inputs), false))
    })
}

async fn autoloader_screen(
    autoload: &AutoLoaderStore,
    registry: &ProcessRegistry,
    session: &Arc<GameSession>,
    prompter: &Arc<dyn Prompter>,
) {
    loop {
        let configs = autoload.load();
        println!("\n  AUTO LOADER");
        if configs.is_empty() {
            println!("  No saved configurations.");
        }
        for (i, entry) in configs.iter().enumerate() {
            println!(
                "  ({}) {} [{}] — {} (launched {} times)",
                i + 1,
                entry.module_name,
                if entry.enabled { "enabled" } else { "disabled" },
                entry.description,
                entry.launch_count,
            );
        }
        println!(
            "\n  (1) Enable/disable  (2) Remove  (3) Record new  (4) Launch enabled now  (0) Back"
        );

        match prompter.read_choice("  Select: ", 0, 4) {
            0 => return,
            1 => {
                if configs.is_empty() {
                    continue;
                }
                let pick =
                    prompter.read_choice("  Which config? (0 cancels): ", 0, configs.len() as i64);
                if pick > 0 {
                    if let Some(enabled) = autoload.toggle((pick - 1) as usize) {
                        println!("  Now {}.", if enabled { "enabled" } else { "disabled" });
                    }
                }
            }
            2 => {
                if configs.is_empty() {
                    continue;
                }
                let pick =
                    prompter.read_choice("  Which config? (0 cancels): ", 0, configs.len() as i64);
                if pick > 0 {
                    if let Some(removed) = autoload.remove((pick - 1) as usize) {
                        println!("  Removed {}.", removed.module_name);
                    }
                }
            }
            3 => record_new(autoload, session, prompter).await,
            4 => launch_saved(autoload, registry, session),
            _ => {}
        }
    }
}

/// Record a module's config phase and save it as an auto-load entry.
async fn record_new(
    autoload: &AutoLoaderStore,
    session: &Arc<GameSession>,
    prompter: &Arc<dyn Prompter>,
) {
    let background: Vec<_> =
        modules::registered_modules().into_iter().filter(|m| m.background).collect();
    if background.is_empty() {
        println!("  No recordable modules.");
        return;
    }

    println!("\n  Record which module?");
    println!("  (0) Cancel");
    for (i, module) in background.iter().enumerate() {
        println!("  ({}) {}", i + 1, module.label);
    }
    let pick = prompter.read_choice("  Select: ", 0, background.len() as i64);
    if pick == 0 {
        return;
    }
    let module = &background[(pick - 1) as usize];

    println!("\n  Configure {} normally; your answers are being recorded.\n", module.label);
    match supervisor::dispatch(module, session, None, true).await {
        Ok(pid) => println!("  {} is running as PID {pid}.", module.label),
        Err(e) => {
            println!("  Recording failed: {e:#}");
            return;
        }
    }

    let Some(inputs) = take_recorded_inputs() else {
        println!("  No inputs were recorded; nothing saved.");
        return;
    };
    println!("  Recorded {} answers.", inputs.len());

    let mut description = prompter.read_line("  Description for this config: ");
    if description.is_empty() {
        description = format!("{} auto-config", module.label);
    }
    autoload.add(AutoLoadEntry::new(module.label, module.number, inputs, description));
    println!("  Saved and enabled.");
}
