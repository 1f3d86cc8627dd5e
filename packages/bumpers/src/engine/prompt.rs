//! Handle prompts submitted by the user.
//!
//! A prompt can be a built-in command (`bumpers status`), change the
//! operation mode through a trigger phrase, or invoke a configured command
//! with `$name args...`.

use color_eyre::eyre::Result;

use crate::claude::hook::{HookEvent, HookKind, Response};

use super::{BuiltinCommand, Engine};

/// Phrases that approve a plan and switch to execute mode.
pub const TRIGGER_PHRASES: &[&str] = &["make it so", "go ahead"];

/// Phrases that force plan mode.
pub const EMERGENCY_STOP_PHRASES: &[&str] = &["STOP", "SILENCE"];

/// The prefix of a command invocation.
pub const COMMAND_PREFIX: char = '$';

/// A mode change requested by a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Execute,
    Stop,
}

impl Transition {
    /// Detect a phrase in the prompt, ignoring case.
    ///
    /// An emergency stop wins over a trigger in the same prompt.
    pub fn detect(prompt: &str) -> Option<Self> {
        let prompt = prompt.to_lowercase();
        let contains = |phrases: &[&str]| {
            phrases
                .iter()
                .any(|phrase| prompt.contains(&phrase.to_lowercase()))
        };

        if contains(EMERGENCY_STOP_PHRASES) {
            Some(Transition::Stop)
        } else if contains(TRIGGER_PHRASES) {
            Some(Transition::Execute)
        } else {
            None
        }
    }
}

#[tracing::instrument(name = "prompt::handle", skip_all)]
pub(super) fn handle(engine: &Engine, event: &HookEvent) -> Result<Response> {
    let prompt = event.prompt.as_deref().unwrap_or_default();

    if let Some(command) = BuiltinCommand::parse(prompt) {
        let message = engine.process_builtin_command(command)?;
        return Ok(Response::informational(HookKind::UserPromptSubmit, message));
    }

    if engine.short_circuit() {
        return Ok(Response::Allow);
    }

    if let Some(transition) = Transition::detect(prompt) {
        apply_transition(engine, transition);
        return Ok(Response::Allow);
    }

    match prompt.trim_start().strip_prefix(COMMAND_PREFIX) {
        Some(invocation) => run_command(engine, invocation),
        None => Ok(Response::Allow),
    }
}

fn apply_transition(engine: &Engine, transition: Transition) {
    let Some(storage) = engine.storage() else {
        tracing::warn!(?transition, "no state store; mode change not recorded");
        return;
    };

    let result = match transition {
        Transition::Execute => storage.trigger_execute(),
        Transition::Stop => storage.emergency_stop(),
    };
    match result {
        Ok(state) => tracing::info!(mode = %state.mode, trigger_count = state.trigger_count, "operation mode changed"),
        Err(error) => tracing::warn!(?error, ?transition, "record mode change"),
    }
}

/// Run `name args...` against the configured commands.
fn run_command(engine: &Engine, invocation: &str) -> Result<Response> {
    let mut words = invocation.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(Response::Allow);
    };
    let args = words.collect::<Vec<_>>();

    let Some(command) = engine.config.commands.iter().find(|command| command.name == name) else {
        tracing::debug!(name, "no such command");
        return Ok(Response::Allow);
    };

    let joined = args.join(" ");
    let mut vars = engine.variables();
    vars.insert(String::from("Name"), name.to_string());
    vars.insert(String::from("Command"), joined.clone());
    vars.insert(String::from("Args"), joined);
    vars.insert(String::from("Argc"), args.len().to_string());

    let message = engine.render_message(&command.send, &vars);
    let pattern = format!("{COMMAND_PREFIX}{name}");
    let message = engine.rephrase(&message, &pattern, &command.generate);
    Ok(Response::informational(HookKind::UserPromptSubmit, message))
}
