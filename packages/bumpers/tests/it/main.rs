//! Integration tests for bumpers.
//!
//! End-to-end tests run the built binary against a temporary project with its
//! own config file and state database; library tests drive the engine
//! directly with a fake generator.

mod cli;
mod prompt;
mod scenarios;
mod session;
mod state;

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bumpers::{
    claude::hook::{Envelope, Response},
    config::Config,
    engine::Engine,
    project::Project,
    rephrase::Generator,
    storage::Storage,
};
use color_eyre::eyre::Result;
use serde_json::Value;
use tempfile::TempDir;
use xshell::{Shell, cmd};

/// The result of running the binary.
#[derive(Debug)]
pub struct Outcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// A temporary project with its own config and state database.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a project whose `bumpers.yml` holds `config`.
    pub fn new(config: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(dir.path().join("bumpers.yml"), config).expect("write config");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn database(&self) -> PathBuf {
        self.dir.path().join("state").join("bumpers.db")
    }

    /// Open the project's state store the way the binary does.
    pub fn storage(&self) -> Storage {
        let project = Project::from_root(self.root()).expect("identify project");
        Storage::open(&self.database(), project.id()).expect("open storage")
    }

    /// Run `bumpers hook` with the event on stdin.
    pub fn hook(&self, event: Value) -> Outcome {
        self.run(&["hook"], &event.to_string())
    }

    /// Run the binary with the given arguments and stdin.
    pub fn run(&self, args: &[&str], stdin: &str) -> Outcome {
        let sh = Shell::new().expect("create shell");
        sh.change_dir(self.root());

        let bin = env!("CARGO_BIN_EXE_bumpers");
        let output = cmd!(sh, "{bin} {args...}")
            .env("CLAUDE_PROJECT_DIR", self.root())
            .env("BUMPERS_DB", self.database())
            .env_remove("BUMPERS_CONFIG")
            .env_remove("BUMPERS_SKIP")
            .env_remove("BUMPERS_LOG")
            .stdin(stdin)
            .ignore_status()
            .quiet()
            .output()
            .expect("run bumpers");

        Outcome {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// A `PreToolUse` event for a shell command.
pub fn bash(command: &str) -> Value {
    serde_json::json!({
        "hook_event_name": "PreToolUse",
        "session_id": "test",
        "tool_name": "Bash",
        "tool_use_id": "toolu_1",
        "tool_input": {"command": command, "description": "Run a command"},
    })
}

/// A `UserPromptSubmit` event.
pub fn prompt(text: &str) -> Value {
    serde_json::json!({
        "hook_event_name": "UserPromptSubmit",
        "session_id": "test",
        "prompt": text,
    })
}

/// Counts calls and answers with a fixed rephrasing.
#[derive(Clone, Default)]
pub struct Counting {
    pub calls: Rc<Cell<usize>>,
}

impl Generator for Counting {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        let message = prompt.rsplit("Message: ").next().unwrap_or_default();
        Ok(format!("Rephrased: {message}"))
    }
}

/// An engine over an in-memory store with a counting generator.
pub fn engine(yaml: &str) -> (Engine, Counting) {
    let generator = Counting::default();
    let engine = Engine::builder()
        .config(Config::from_yaml(yaml).expect("parse config"))
        .project(Project::new("it", "/work/project"))
        .storage(Storage::open_in_memory("it").expect("open storage"))
        .generator(Box::new(generator.clone()))
        .bypass(false)
        .build();
    (engine, generator)
}

/// Run an event through the engine.
pub fn handle(engine: &Engine, event: Value) -> Response {
    let envelope = Envelope::parse(&event.to_string()).expect("parse event");
    engine.handle(&envelope).expect("handle event")
}
