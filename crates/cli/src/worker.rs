// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The detached worker entry point (hidden `worker` subcommand).
//!
//! A worker reconstructs its own session from the handoff file, runs the
//! module's config phase (interactive, recorded, or replayed), crosses the
//! background gate, and then stays alive running the module's background
//! phase. From that point the only links to the parent are the registry,
//! the mailbox, and OS signals.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use argosy_client::login::captcha::SolverChain;
use argosy_client::prompt::Prompter;
use argosy_client::session::{GameSession, SessionDeps, SessionState};

use crate::config::Config;
use crate::mailbox::CriticalErrorMailbox;
use crate::modules::{self, ModuleCtx};
use crate::prompts::{RecordingPrompter, ReplayPrompter, TerminalPrompter};
use crate::registry::{ProcessRegistry, RegistrySink, WorkerRecord, FROZEN_THRESHOLD};

#[derive(Debug, clap::Args)]
pub struct WorkerArgs {
    /// Module number to run.
    #[arg(long)]
    pub module: u16,

    /// Serialized session handoff file (consumed and deleted).
    #[arg(long)]
    pub session: PathBuf,

    /// Marker file to create once the config phase is done.
    #[arg(long)]
    pub handoff: PathBuf,

    /// Recorded inputs to replay instead of prompting.
    #[arg(long)]
    pub inputs: Option<PathBuf>,

    /// Capture config answers for the auto-loader.
    #[arg(long)]
    pub record: bool,
}

/// Config-to-background transition, crossed exactly once per worker.
pub struct BackgroundGate {
    handoff_marker: PathBuf,
    recorder: Option<Arc<RecordingPrompter>>,
    world: String,
    user: String,
    entered: AtomicBool,
}

impl BackgroundGate {
    pub fn new(
        handoff_marker: PathBuf,
        recorder: Option<Arc<RecordingPrompter>>,
        world: String,
        user: String,
    ) -> Self {
        Self { handoff_marker, recorder, world, user, entered: AtomicBool::new(false) }
    }

    /// Detach: swallow Ctrl-C, flush any recording, register in the
    /// process registry, wire the heartbeat sink, and signal the parent.
    pub fn enter(&self, session: &GameSession, label: &str) -> anyhow::Result<()> {
        if self.entered.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // A Ctrl-C aimed at the parent's terminal must not take the
        // detached workers down with it.
        tokio::spawn(async {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                tracing::debug!("interrupt ignored in background worker");
            }
        });

        if let Some(recorder) = &self.recorder {
            recorder.flush_to_handoff()?;
            tracing::info!(answers = recorder.recorded().len(), "recorded inputs flushed");
        }

        let pid = std::process::id();
        let registry = ProcessRegistry::new(&self.world, &self.user, FROZEN_THRESHOLD);
        registry.register(WorkerRecord::new(pid, label));
        session.set_status_sink(Arc::new(RegistrySink::new(
            ProcessRegistry::new(&self.world, &self.user, FROZEN_THRESHOLD),
            pid,
        )));

        std::fs::write(&self.handoff_marker, b"ready")?;
        tracing::info!(pid, label, "entered background mode");
        Ok(())
    }

    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}

/// Worker main: restore the session, run the module, report fatal errors.
pub async fn run(args: WorkerArgs, config: &Config) -> anyhow::Result<()> {
    let state = SessionState::take(&args.session)?;
    let world = state.world.to_string();
    let user = state.player.clone();

    let Some(module) = modules::find_module(args.module) else {
        anyhow::bail!("unknown module number {}", args.module);
    };

    // Replayed workers never prompt by design; the terminal fallback only
    // matters for interactive and recording runs.
    let terminal: Arc<dyn Prompter> = Arc::new(TerminalPrompter);
    let mut recorder: Option<Arc<RecordingPrompter>> = None;
    let prompter: Arc<dyn Prompter> = match &args.inputs {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let _ = std::fs::remove_file(path);
            let inputs: Vec<String> = serde_json::from_str(&raw)?;
            Arc::new(ReplayPrompter::new(inputs, Arc::clone(&terminal)))
        }
        None if args.record => {
            let recording = Arc::new(RecordingPrompter::new(Arc::clone(&terminal)));
            recorder = Some(Arc::clone(&recording));
            recording
        }
        None => terminal,
    };

    let endpoints = config.endpoints();
    let interactive = args.inputs.is_none();
    let solver = Arc::new(SolverChain::standard(
        endpoints.solver_api.as_deref(),
        interactive,
        Arc::clone(&prompter),
    ));

    let session = GameSession::restore(
        state,
        SessionDeps {
            endpoints,
            tunables: argosy_client::config::Tunables::default(),
            prompter: Arc::clone(&prompter),
            solver,
        },
    )?;
    session.start_health_pinger();

    let gate =
        Arc::new(BackgroundGate::new(args.handoff.clone(), recorder, world.clone(), user.clone()));
    let ctx = ModuleCtx {
        session: Arc::clone(&session),
        prompter,
        notifier: config.notifier(),
        gate: Some(Arc::clone(&gate)),
    };

    let result = (module.run)(ctx).await;
    if let Err(ref e) = result {
        // Failures after detach surface through the mailbox; before the
        // gate the parent still sees our exit status.
        if gate.entered() {
            CriticalErrorMailbox::new(&world, &user).report(module.label, &format!("{e:#}"));
        }
        tracing::error!(module = module.label, err = %format!("{e:#}"), "worker failed");
    }

    session.close();
    result
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
