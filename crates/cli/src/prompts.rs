// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompter implementations: terminal, recording, and replay.
//!
//! Module config phases only ever talk to the [`Prompter`] capability, so
//! the same module runs interactively (terminal), under recording (answers
//! captured for the auto-loader), or replayed (captured answers consumed
//! from the front, falling back to the wrapped prompter once exhausted —
//! which a detached worker must never reach).

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

pub use argosy_client::prompt::{Headless, Prompter};

use crate::paths;

// ── Terminal ────────────────────────────────────────────────────────────

/// Blocking stdin/stdout prompter with a no-echo password read.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_raw(&self, prompt: &str) -> String {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim().to_owned()
    }
}

impl Prompter for TerminalPrompter {
    fn read_line(&self, prompt: &str) -> String {
        self.read_raw(prompt)
    }

    fn read_password(&self, prompt: &str) -> String {
        let stdin = std::io::stdin();
        let saved = rustix::termios::tcgetattr(&stdin).ok();
        if let Some(ref saved) = saved {
            let mut silent = saved.clone();
            silent.local_modes &= !rustix::termios::LocalModes::ECHO;
            let _ = rustix::termios::tcsetattr(
                &stdin,
                rustix::termios::OptionalActions::Flush,
                &silent,
            );
        }

        let answer = self.read_raw(prompt);
        println!();

        if let Some(saved) = saved {
            let _ = rustix::termios::tcsetattr(
                &stdin,
                rustix::termios::OptionalActions::Flush,
                &saved,
            );
        }
        answer
    }

    fn read_choice(&self, prompt: &str, min: i64, max: i64) -> i64 {
        loop {
            let raw = self.read_raw(prompt);
            if let Ok(value) = raw.parse::<i64>() {
                if (min..=max).contains(&value) {
                    return value;
                }
            }
            println!("  Please enter a number between {min} and {max}.");
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            match self.read_raw(&format!("{prompt} {hint} ")).to_lowercase().as_str() {
                "" => return default,
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => println!("  Please enter 'y' or 'n'."),
            }
        }
    }
}

// ── Recording ───────────────────────────────────────────────────────────

/// Wraps another prompter and captures every answer, in order, so the
/// auto-loader can replay the whole config phase later.
pub struct RecordingPrompter {
    inner: Arc<dyn Prompter>,
    recorded: Mutex<Vec<String>>,
}

impl RecordingPrompter {
    pub fn new(inner: Arc<dyn Prompter>) -> Self {
        Self { inner, recorded: Mutex::new(Vec::new()) }
    }

    fn capture(&self, answer: String) -> String {
        self.recorded.lock().push(answer.clone());
        answer
    }

    pub fn recorded(&self) -> Vec<String> {
        self.recorded.lock().clone()
    }

    /// Write the captured answers to the well-known handoff file the
    /// parent reads after the config phase completes.
    pub fn flush_to_handoff(&self) -> anyhow::Result<()> {
        let path = paths::recorded_inputs_file();
        let json = serde_json::to_string(&self.recorded())?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Prompter for RecordingPrompter {
    fn read_line(&self, prompt: &str) -> String {
        let answer = self.inner.read_line(prompt);
        self.capture(answer)
    }

    fn read_password(&self, prompt: &str) -> String {
        let answer = self.inner.read_password(prompt);
        self.capture(answer)
    }

    fn read_choice(&self, prompt: &str, min: i64, max: i64) -> i64 {
        let answer = self.inner.read_choice(prompt, min, max);
        self.capture(answer.to_string());
        answer
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        let answer = self.inner.confirm(prompt, default);
        self.capture(if answer { "y".to_owned() } else { "n".to_owned() });
        answer
    }
}

/// Read and remove the recorded-inputs handoff file. `None` when no
/// recording completed.
pub fn take_recorded_inputs() -> Option<Vec<String>> {
    let path = paths::recorded_inputs_file();
    let contents = std::fs::read_to_string(&path).ok()?;
    let _ = std::fs::remove_file(&path);
    serde_json::from_str(&contents).ok()
}

// ── Replay ──────────────────────────────────────────────────────────────

/// Feeds recorded answers from the front; once the queue runs dry it
/// falls back to the wrapped prompter.
pub struct ReplayPrompter {
    queue: Mutex<VecDeque<String>>,
    fallback: Arc<dyn Prompter>,
}

impl ReplayPrompter {
    pub fn new(inputs: Vec<String>, fallback: Arc<dyn Prompter>) -> Self {
        Self { queue: Mutex::new(inputs.into()), fallback }
    }

    fn next(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Prompter for ReplayPrompter {
    fn read_line(&self, prompt: &str) -> String {
        match self.next() {
            Some(answer) => answer,
            None => self.fallback.read_line(prompt),
        }
    }

    fn read_password(&self, prompt: &str) -> String {
        match self.next() {
            Some(answer) => answer,
            None => self.fallback.read_password(prompt),
        }
    }

    fn read_choice(&self, prompt: &str, min: i64, max: i64) -> i64 {
        match self.next().and_then(|raw| raw.parse::<i64>().ok()) {
            Some(value) if (min..=max).contains(&value) => value,
            Some(out_of_range) => {
                tracing::warn!(out_of_range, min, max, "replayed choice out of range, clamping");
                out_of_range.clamp(min, max)
            }
            None => self.fallback.read_choice(prompt, min, max),
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        match self.next().as_deref() {
            Some("y") | Some("yes") => true,
            Some("n") | Some("no") => false,
            Some(other) => {
                tracing::warn!(answer = other, "unrecognized replayed confirmation, using default");
                default
            }
            None => self.fallback.confirm(prompt, default),
        }
    }
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
