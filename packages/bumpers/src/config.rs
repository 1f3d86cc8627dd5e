//! Configuration data types and loading.

use std::io::ErrorKind;
use std::path::Path;
use std::{fs::read_to_string, time::Duration};

use color_eyre::{
    SectionExt,
    eyre::{Context, Result},
};
use serde::{Deserialize, Serialize};
use tap::Tap;

use crate::rephrase::Generate;
use crate::rules::{Rule, RuleMatcher, Validation};

/// The default config file name, relative to the project root.
pub const DEFAULT_CONFIG_FILE: &str = "bumpers.yml";

/// The complete configuration for a project.
///
/// ```yaml
/// rules:
///   - pattern: "go test"
///     send: "Use just test instead"
/// commands:
///   - name: review
///     send: "Review the diff for {{.Command}}"
/// session:
///   - add: "Today is {{.Today}}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Rules matched against tool calls.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Commands the user invokes with `$name` in a prompt.
    #[serde(default)]
    pub commands: Vec<CommandConfig>,

    /// Notes added to the agent's context when a session starts.
    #[serde(default)]
    pub session: Vec<SessionConfig>,

    /// How messages are rephrased.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// A prompt command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandConfig {
    /// The command name, typed after `$`.
    pub name: String,

    /// The message template added to the agent's context.
    pub send: String,

    #[serde(default)]
    pub generate: Generate,
}

/// A session note.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// The message template added to the agent's context.
    pub add: String,

    #[serde(default)]
    pub generate: Generate,
}

/// The external command used to rephrase messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// The program and arguments, as a list or a shell-quoted string.
    #[serde(default = "GeneratorConfig::default_command")]
    pub command: CommandSpec,

    /// Seconds before the command is killed.
    #[serde(default = "GeneratorConfig::default_timeout")]
    pub timeout: u64,
}

impl GeneratorConfig {
    fn default_command() -> CommandSpec {
        CommandSpec::Args(vec![String::from("claude"), String::from("-p")])
    }

    fn default_timeout() -> u64 {
        30
    }

    /// The program and its arguments.
    pub fn argv(&self) -> Result<Vec<String>> {
        match &self.command {
            CommandSpec::Args(args) => Ok(args.clone()),
            CommandSpec::Line(line) => shell_words::split(line)
                .with_context(|| format!("split generator command: {line:?}")),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            timeout: Self::default_timeout(),
        }
    }
}

/// A command given either as separate arguments or as one string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Args(Vec<String>),
    Line(String),
}

impl Config {
    /// Parse a config document; an empty document is an empty config.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Option<Config>>(content)
            .map(Option::unwrap_or_default)
            .context("parse config")
    }

    /// Load a config file; a missing file is an empty config.
    #[tracing::instrument]
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("config file not found; using an empty config");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).context(format!("read config file: {path:?}")),
        };

        Self::from_yaml(&content)
            .with_context(|| format!("parse config file: {path:?}"))
            .with_context(|| content.header("File content:"))
            .tap(|config| tracing::debug!(?config, "parsed config file"))
    }
}

/// Compile every rule in the config and summarize the result.
pub fn validate_config(config: &Config) -> Validation {
    RuleMatcher::new(&config.rules).validate()
}
