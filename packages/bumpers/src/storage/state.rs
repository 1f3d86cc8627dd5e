//! Operator state: whether rules run, the one-shot skip flag, and the
//! plan/execute operation mode.

use chrono::Utc;
use color_eyre::eyre::Result;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{Storage, Table};

/// Key of the `rules_enabled` flag.
pub const RULES_ENABLED: &str = "state:rules_enabled";

/// Key of the one-shot skip flag.
pub const SKIP_NEXT: &str = "state:skip_next_rule_hook";

/// Key of the operation state record.
pub const OPERATION_MODE: &str = "state:operation_mode";

/// Whether the agent is planning or allowed to edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Editing tools are blocked until a trigger phrase is seen.
    #[display("plan")]
    Plan,

    /// Editing tools are allowed.
    #[default]
    #[display("execute")]
    Execute,
}

/// The recorded operation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperationState {
    pub mode: OperationMode,

    /// How many trigger phrases have switched the mode to execute.
    #[serde(default)]
    pub trigger_count: u64,

    /// Unix seconds of the last write.
    #[serde(default)]
    pub updated_at: i64,
}

impl OperationState {
    /// The state after a trigger phrase: execute mode, one more trigger.
    pub fn triggered(self) -> Self {
        Self {
            mode: OperationMode::Execute,
            trigger_count: self.trigger_count + 1,
            updated_at: Utc::now().timestamp(),
        }
    }

    /// The state after an emergency stop: plan mode, count unchanged.
    pub fn stopped(self) -> Self {
        Self {
            mode: OperationMode::Plan,
            updated_at: Utc::now().timestamp(),
            ..self
        }
    }
}

impl Storage {
    /// Whether rules are evaluated; defaults to `true`.
    pub fn rules_enabled(&self) -> Result<bool> {
        Ok(self.get(Table::State, RULES_ENABLED)?.unwrap_or(true))
    }

    pub fn set_rules_enabled(&self, enabled: bool) -> Result<()> {
        self.put(Table::State, RULES_ENABLED, &enabled)
    }

    /// Whether the next hook is skipped; defaults to `false`.
    pub fn skip_next(&self) -> Result<bool> {
        Ok(self.get(Table::State, SKIP_NEXT)?.unwrap_or(false))
    }

    pub fn set_skip_next(&self, skip: bool) -> Result<()> {
        self.put(Table::State, SKIP_NEXT, &skip)
    }

    /// Read the skip flag and clear it in one transaction.
    pub fn consume_skip_next(&self) -> Result<bool> {
        self.consume(Table::State, SKIP_NEXT)
    }

    /// The operation state; defaults to execute mode with no triggers.
    pub fn operation_state(&self) -> Result<OperationState> {
        Ok(self.get(Table::State, OPERATION_MODE)?.unwrap_or_default())
    }

    pub fn set_operation_state(&self, state: &OperationState) -> Result<()> {
        self.put(Table::State, OPERATION_MODE, state)
    }

    /// Record a trigger phrase and return the new state.
    #[tracing::instrument(skip(self))]
    pub fn trigger_execute(&self) -> Result<OperationState> {
        let state = self.operation_state()?.triggered();
        self.set_operation_state(&state)?;
        Ok(state)
    }

    /// Force plan mode and return the new state.
    #[tracing::instrument(skip(self))]
    pub fn emergency_stop(&self) -> Result<OperationState> {
        let state = self.operation_state()?.stopped();
        self.set_operation_state(&state)?;
        Ok(state)
    }
}
