// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task status screen: worker health, restart, kill.

use crate::autoload::AutoLoaderStore;
use crate::registry::{Health, ProcessRegistry, WorkerRecord, FROZEN_THRESHOLD};
use crate::supervisor;

use super::{find_module_by_label, ModuleCtx, ModuleFuture};

pub fn run(ctx: ModuleCtx) -> ModuleFuture {
    Box::pin(async move {
        let world = ctx.world_key();
        let user = ctx.user_key();
        let registry = ProcessRegistry::new(&world, &user, FROZEN_THRESHOLD);
        let store = AutoLoaderStore::new(&world, &user);

        loop {
            let workers = registry.refresh();
            println!("\n  BACKGROUND TASKS\n");
            if workers.is_empty() {
                println!("  No background tasks are running.");
                return Ok(());
            }

            for (i, worker) in workers.iter().enumerate() {
                println!("  ({}) {}", i + 1, describe(&registry, worker));
            }
            println!("  (0) Back");

            let pick = ctx.prompter.read_choice("\n  Select a task: ", 0, workers.len() as i64);
            if pick == 0 {
                return Ok(());
            }
            let Some(worker) = workers.get((pick - 1) as usize) else {
                continue;
            };

            let action = ctx.prompter.read_choice(
                "  (1) Restart from saved config  (2) Kill  (3) Leave it\n  Action: ",
                1,
                3,
            );
            match action {
                1 => {
                    let Some(entry) = store.find_by_module(&worker.label) else {
                        println!("  No saved configuration for '{}'.", worker.label);
                        continue;
                    };
                    let Some(module) = find_module_by_label(&worker.label) else {
                        println!("  Module '{}' is not registered.", worker.label);
                        continue;
                    };
                    match supervisor::restart(worker.pid, &module, &entry, &ctx.session).await {
                        Ok(pid) => println!("  Restarted '{}' as PID {pid}.", worker.label),
                        Err(e) => println!("  Restart failed: {e:#}"),
                    }
                }
                2 => match supervisor::kill(worker.pid) {
                    Ok(()) => println!("  Killed PID {}.", worker.pid),
                    Err(e) => println!("  Kill failed: {e}"),
                },
                _ => {}
            }
        }
    })
}

fn describe(registry: &ProcessRegistry, worker: &WorkerRecord) -> String {
    let age = registry.heartbeat_age(worker).as_secs();
    let health = match registry.health(worker) {
        Health::Ok => "OK",
        Health::Frozen => "FROZEN",
        Health::Paused => "PAUSED",
    };
    format!(
        "[{health}] {} (pid {}) — {} — heartbeat {}s ago",
        worker.label, worker.pid, worker.status, age
    )
}

#[cfg(test)]
#[path = "task_status_tests.rs"]
mod tests;
