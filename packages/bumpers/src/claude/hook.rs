//! Types and parsers for interacting with Claude Code hooks.

use std::path::PathBuf;

use bon::Builder;
use color_eyre::eyre::{Context, Result, bail};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Claude Code hooks handled by bumpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum HookKind {
    /// Sent before a tool is used.
    PreToolUse,

    /// Sent after a tool completed.
    PostToolUse,

    /// Sent when the user submits a prompt.
    UserPromptSubmit,

    /// Sent when a session starts, is cleared, or is resumed.
    SessionStart,
}

impl HookKind {
    /// Classify a raw event.
    ///
    /// The `hook_event_name` field wins when present. Otherwise the kind is
    /// inferred from which fields the event carries. Returns `None` for
    /// events bumpers does not handle.
    pub fn classify(raw: &Map<String, Value>) -> Option<Self> {
        if let Some(name) = raw.get("hook_event_name").and_then(Value::as_str) {
            return match name {
                "PreToolUse" => Some(HookKind::PreToolUse),
                "PostToolUse" => Some(HookKind::PostToolUse),
                "UserPromptSubmit" => Some(HookKind::UserPromptSubmit),
                "SessionStart" => Some(HookKind::SessionStart),
                _ => None,
            };
        }

        match (
            raw.contains_key("tool_input"),
            raw.contains_key("tool_response"),
            raw.contains_key("prompt"),
        ) {
            (true, true, _) => Some(HookKind::PostToolUse),
            (true, false, _) => Some(HookKind::PreToolUse),
            (false, _, true) => Some(HookKind::UserPromptSubmit),
            _ => None,
        }
    }
}

/// The fields of a hook event that bumpers reads.
///
/// Every field is optional; which ones are present depends on the hook.
/// A field that is `null` or has an unexpected type decodes as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HookEvent {
    #[serde(deserialize_with = "lenient")]
    pub hook_event_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub tool_name: String,
    #[serde(deserialize_with = "lenient")]
    pub tool_input: Map<String, Value>,
    #[serde(deserialize_with = "lenient")]
    pub tool_response: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    pub tool_use_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub transcript_path: Option<PathBuf>,
    #[serde(deserialize_with = "lenient")]
    pub session_id: Option<String>,

    /// Why a session started: `startup`, `clear`, or `resume`.
    #[serde(deserialize_with = "lenient")]
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub prompt: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub cwd: Option<PathBuf>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|error| {
        tracing::debug!(%error, "ignoring hook event field with unexpected type");
        T::default()
    }))
}

impl HookEvent {
    /// The transcript path, ignoring empty strings.
    pub fn transcript(&self) -> Option<&std::path::Path> {
        self.transcript_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// The tool use ID, ignoring empty strings.
    pub fn tool_use(&self) -> Option<&str> {
        self.tool_use_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The tool response as a field set.
    ///
    /// An object is used as-is; a bare string is wrapped as
    /// `{"tool_response": <string>}`. Anything else is empty.
    pub fn response_fields(&self) -> Map<String, Value> {
        match &self.tool_response {
            Some(Value::Object(fields)) => fields.clone(),
            Some(Value::String(text)) => {
                Map::from_iter([(String::from("tool_response"), Value::from(text.as_str()))])
            }
            _ => Map::new(),
        }
    }
}

/// A parsed hook event and its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `None` when the event is not one bumpers handles.
    pub kind: Option<HookKind>,
    pub event: HookEvent,
}

impl Envelope {
    /// Parse the JSON object Claude Code writes to a hook's stdin.
    pub fn parse(raw: &str) -> Result<Self> {
        let value = serde_json::from_str::<Value>(raw).context("parse hook event as JSON")?;
        let Value::Object(fields) = value else {
            bail!("hook event is not a JSON object");
        };

        let kind = HookKind::classify(&fields);
        let event = serde_json::from_value::<HookEvent>(Value::Object(fields))
            .context("decode hook event fields")?;
        Ok(Self { kind, event })
    }
}

/// The decision a hook reports to Claude Code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Pass the operation through silently.
    Allow,

    /// Add context for the agent without blocking.
    Informational { event: HookKind, message: String },

    /// Block the tool call and show the message to the agent.
    Block { message: String },
}

impl Response {
    /// An informational response, or allow if the message is blank.
    pub fn informational(event: HookKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Response::Allow
        } else {
            Response::Informational { event, message }
        }
    }

    /// A blocking response, or allow if the message is blank.
    pub fn block(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Response::Allow
        } else {
            Response::Block { message }
        }
    }

    /// The process exit code Claude Code expects for this response.
    pub fn exit_code(&self) -> i32 {
        match self {
            Response::Block { .. } => 2,
            Response::Allow | Response::Informational { .. } => 0,
        }
    }

    /// The text written to stdout; empty for allow.
    pub fn render(&self) -> Result<String> {
        match self {
            Response::Allow => Ok(String::new()),
            Response::Block { message } => Ok(message.clone()),
            Response::Informational { event, message } => {
                let output = HookSpecificOutput::builder()
                    .hook_event_name(*event)
                    .additional_context(message)
                    .build();
                serde_json::to_string(&HookResponseEnvelope {
                    hook_specific_output: output,
                })
                .context("serialize hook response")
            }
        }
    }

    /// The message carried by the response, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Allow => None,
            Response::Informational { message, .. } | Response::Block { message } => {
                Some(message.as_str())
            }
        }
    }
}

/// The top-level structure of a Claude Code hook response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HookResponseEnvelope<'a> {
    hook_specific_output: HookSpecificOutput<'a>,
}

/// Context appended to the agent's conversation.
#[derive(Debug, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
struct HookSpecificOutput<'a> {
    /// The hook event name.
    hook_event_name: HookKind,

    /// The text added to the agent's context.
    additional_context: &'a str,
}
