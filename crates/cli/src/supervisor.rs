// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning, observing, killing, and restarting background workers.
//!
//! A worker is a fresh OS process of this same binary running the hidden
//! `worker` subcommand. The parent hands it a serialized session through a
//! temp file, then blocks on a handoff marker the worker creates once its
//! config phase is done and it has detached. There is no shared memory —
//! the registry, mailbox, and autoload files are the only coordination.

use std::path::Path;
use std::time::Duration;

use argosy_client::notify::Notify;
use argosy_client::session::GameSession;

use crate::autoload::AutoLoadEntry;
use crate::mailbox::CriticalErrorMailbox;
use crate::modules::ModuleDef;
use crate::paths;

/// How long the parent waits for a worker to finish its config phase.
/// Interactive configuration can take a while; replayed config cannot.
const HANDOFF_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const HANDOFF_POLL: Duration = Duration::from_millis(200);

/// Spawn a worker for `module` and block until it detaches.
///
/// `inputs` replays a recorded config; `record` asks the worker to capture
/// its config answers for the auto-loader. Returns the worker PID.
pub async fn dispatch(
    module: &ModuleDef,
    session: &GameSession,
    inputs: Option<&[String]>,
    record: bool,
) -> anyhow::Result<u32> {
    let tag = uuid::Uuid::new_v4().to_string();
    let session_file = paths::session_handoff_file(&tag);
    let marker = paths::handoff_marker_file(&tag);

    session.serialize().save(&session_file)?;

    let mut command = std::process::Command::new(std::env::current_exe()?);
    command
        .arg("worker")
        .arg("--module")
        .arg(module.number.to_string())
        .arg("--session")
        .arg(&session_file)
        .arg("--handoff")
        .arg(&marker);
    if let Some(inputs) = inputs {
        let inputs_file = paths::replay_inputs_file(&tag);
        std::fs::write(&inputs_file, serde_json::to_vec(inputs)?)?;
        command.arg("--inputs").arg(&inputs_file);
    }
    if record {
        command.arg("--record");
    }

    let mut child = command.spawn()?;
    let pid = child.id();
    tracing::info!(pid, module = module.label, "worker spawned, waiting for handoff");

    let result = wait_for_handoff(&mut child, &marker).await;
    if result.is_err() {
        // The worker never detached; don't leave its handoff files behind.
        let _ = std::fs::remove_file(&session_file);
    }
    result?;

    tracing::info!(pid, module = module.label, "worker detached");
    Ok(pid)
}

async fn wait_for_handoff(child: &mut std::process::Child, marker: &Path) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + HANDOFF_TIMEOUT;
    loop {
        if marker.exists() {
            let _ = std::fs::remove_file(marker);
            return Ok(());
        }
        if let Some(status) = child.try_wait()? {
            anyhow::bail!("worker exited during its config phase ({status})");
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("worker never signalled its handoff");
        }
        tokio::time::sleep(HANDOFF_POLL).await;
    }
}

/// Terminate a worker. Its registry row is pruned on the next refresh.
pub fn kill(pid: u32) -> anyhow::Result<()> {
    let pid = i32::try_from(pid)?;
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM)?;
    tracing::info!(pid, "worker killed");
    Ok(())
}

/// Kill a worker and relaunch its module from a saved configuration.
pub async fn restart(
    pid: u32,
    module: &ModuleDef,
    entry: &AutoLoadEntry,
    session: &GameSession,
) -> anyhow::Result<u32> {
    if let Err(e) = kill(pid) {
        tracing::warn!(pid, err = %e, "kill before restart failed (already gone?)");
    }
    dispatch(module, session, Some(&entry.recorded_inputs), false).await
}

/// Restart policy for a worker's background phase.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub max_consecutive_failures: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60 * 60),
        }
    }
}

/// Run a module's background phase under bounded restarts.
///
/// On an error the supervisor backs off (exponential, capped), notifies,
/// and re-enters the phase; after the failure budget it reports through
/// the mailbox and gives up.
pub async fn supervise<F, Fut>(
    label: &str,
    policy: &RestartPolicy,
    notifier: &dyn Notify,
    mailbox: &CriticalErrorMailbox,
    mut phase: F,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    let mut failures = 0u32;
    let mut backoff = policy.initial_backoff;

    loop {
        match phase().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                failures += 1;
                tracing::warn!(module = label, failures, err = %e, "background phase failed");

                if failures >= policy.max_consecutive_failures {
                    let message = format!(
                        "{label} gave up after {failures} consecutive failures: {e:#}"
                    );
                    mailbox.report(label, &message);
                    let _ = notifier.send(&message, None).await;
                    return Err(e);
                }

                let _ = notifier
                    .send(
                        &format!(
                            "{label} crashed ({failures}/{}), restarting in {}s: {e:#}",
                            policy.max_consecutive_failures,
                            backoff.as_secs()
                        ),
                        None,
                    )
                    .await;
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
