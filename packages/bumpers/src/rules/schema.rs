//! Schema types for user-defined rules.

use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::rephrase::Generate;

/// Reserved selector token that resolves to the assistant's intent.
pub const INTENT_SELECTOR: &str = "#intent";

/// Reserved selector token that checks every string field of the tool input.
pub const ALL_SELECTOR: &str = "#all";

/// A single rule definition.
///
/// ```yaml
/// rules:
///   - pattern: "go test"
///     tool: "^Bash$"
///     send: "Use `just test` instead of {{.Command}}"
///     generate: off
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    /// Regex matched against the selected text.
    ///
    /// The pattern may reference template variables (`{{.ProjectRoot}}`);
    /// these are rendered before the regex is compiled.
    #[serde(alias = "match")]
    pub pattern: String,

    /// Regex matched case-insensitively against the event's tool name.
    ///
    /// When absent the rule applies to every tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// The fields of the tool input (or response) the pattern is tested against.
    ///
    /// When empty, the default fields for the tool are used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// Which hook event considers this rule.
    #[serde(default)]
    pub event: RuleEvent,

    /// The message template sent to the agent when the rule matches.
    pub send: String,

    /// Whether and how the message is rephrased before it is sent.
    #[serde(default)]
    pub generate: Generate,
}

impl Rule {
    /// Whether the rule reads the assistant's intent.
    pub fn uses_intent(&self) -> bool {
        self.sources.contains(&Source::Intent)
    }

    /// The tool filter, treating an empty string as absent.
    pub fn tool_filter(&self) -> Option<&str> {
        self.tool.as_deref().filter(|tool| !tool.is_empty())
    }
}

/// The hook event a rule is evaluated for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum RuleEvent {
    /// Evaluated before the tool runs; a match blocks the tool call.
    #[default]
    #[serde(alias = "")]
    #[display("pre")]
    Pre,

    /// Evaluated after the tool ran; a match adds context for the agent.
    #[display("post")]
    Post,
}

/// A field selector in a rule's `sources` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    /// The assistant's reasoning text preceding the tool call.
    Intent,

    /// Every string-valued field.
    All,

    /// A named field.
    Field(String),
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        match value.as_str() {
            INTENT_SELECTOR => Source::Intent,
            ALL_SELECTOR => Source::All,
            _ => Source::Field(value),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Source::from(value.to_string())
    }
}

impl From<Source> for String {
    fn from(value: Source) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Intent => f.write_str(INTENT_SELECTOR),
            Source::All => f.write_str(ALL_SELECTOR),
            Source::Field(name) => f.write_str(name),
        }
    }
}
