//! Built-in commands that control bumpers itself.
//!
//! They are recognized in prompts starting with `bumpers ` and are also
//! available as CLI subcommands; both paths run [`Engine::process_builtin_command`].

use color_eyre::eyre::{OptionExt, Result};
use derive_more::Display;

use crate::storage::OperationMode;

use super::Engine;

/// The prompt prefix of a built-in command.
pub const BUILTIN_PREFIX: &str = "bumpers ";

/// A built-in command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BuiltinCommand {
    /// Evaluate rules again.
    #[display("enable")]
    Enable,

    /// Stop evaluating rules until enabled again.
    #[display("disable")]
    Disable,

    /// Report the current state.
    #[display("status")]
    Status,

    /// Allow the next hook without evaluating rules.
    #[display("skip")]
    Skip,
}

impl BuiltinCommand {
    /// Parse a prompt like `bumpers status`.
    pub fn parse(prompt: &str) -> Option<Self> {
        let rest = prompt.trim().strip_prefix(BUILTIN_PREFIX)?;
        match rest.trim() {
            "enable" => Some(BuiltinCommand::Enable),
            "disable" => Some(BuiltinCommand::Disable),
            "status" => Some(BuiltinCommand::Status),
            "skip" => Some(BuiltinCommand::Skip),
            _ => None,
        }
    }
}

impl Engine {
    /// Run a built-in command and return the message to show.
    #[tracing::instrument(skip(self))]
    pub fn process_builtin_command(&self, command: BuiltinCommand) -> Result<String> {
        let storage = self
            .storage()
            .ok_or_eyre("the state store is unavailable")?;

        let message = match command {
            BuiltinCommand::Enable => {
                storage.set_rules_enabled(true)?;
                String::from("bumpers: rules enabled")
            }
            BuiltinCommand::Disable => {
                storage.set_rules_enabled(false)?;
                String::from("bumpers: rules disabled until `bumpers enable`")
            }
            BuiltinCommand::Skip => {
                storage.set_skip_next(true)?;
                String::from("bumpers: the next hook will be skipped")
            }
            BuiltinCommand::Status => {
                let enabled = storage.rules_enabled()?;
                let skip = storage.skip_next()?;
                let state = storage.operation_state()?;
                let mut status = format!(
                    "bumpers: rules {}; {} rule(s) loaded",
                    if enabled { "enabled" } else { "disabled" },
                    self.matcher.validate().valid,
                );
                if skip {
                    status.push_str("; next hook will be skipped");
                }
                status.push_str(&format!(
                    "; mode {} ({} trigger(s))",
                    state.mode, state.trigger_count
                ));
                if state.mode == OperationMode::Plan {
                    status.push_str("; edits are blocked");
                }
                status
            }
        };

        tracing::info!(%command, "ran built-in command");
        Ok(message)
    }
}
