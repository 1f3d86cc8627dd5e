//! Routes hook events to their handlers.
//!
//! Every handler except session start first applies the shared
//! short-circuits, in order:
//! 1. `BUMPERS_SKIP=1` in the environment allows everything.
//! 2. Rules disabled in the state store allows everything.
//! 3. A pending skip flag is consumed and the hook allowed.
//!
//! State store failures never block: the handler falls back to the default
//! state and logs a warning.

use std::cell::Cell;
use std::rc::Rc;

use bon::bon;
use color_eyre::eyre::Result;

use crate::claude::hook::{Envelope, HookEvent, HookKind, Response};
use crate::config::Config;
use crate::project::Project;
use crate::rephrase::{Generate, GenerateRequest, Generator, Rephraser};
use crate::rules::RuleMatcher;
use crate::storage::{OperationState, Storage};
use crate::template::{self, Variables};

pub use builtin::BuiltinCommand;

mod builtin;
mod post_tool;
mod pre_tool;
mod prompt;
mod session;

/// Environment variable that disables all matching when set to `1`.
pub const SKIP_ENV: &str = "BUMPERS_SKIP";

/// A hook handler.
type Handler = fn(&Engine, &HookEvent) -> Result<Response>;

/// The handler for each kind of hook.
fn handler_for(kind: HookKind) -> Handler {
    match kind {
        HookKind::PreToolUse => pre_tool::handle,
        HookKind::PostToolUse => post_tool::handle,
        HookKind::UserPromptSubmit => prompt::handle,
        HookKind::SessionStart => session::handle,
    }
}

/// Whether the environment asks for every hook to be allowed.
pub fn bypass_from_env() -> bool {
    std::env::var(SKIP_ENV).is_ok_and(|value| value == "1")
}

/// Processes hook events for one project.
pub struct Engine {
    config: Config,
    matcher: RuleMatcher,
    project: Project,
    storage: Option<Storage>,
    generator: Box<dyn Generator>,
    bypass: bool,

    /// Set once a rephrase cache failure has been logged.
    cache_warned: Rc<Cell<bool>>,
}

#[bon]
impl Engine {
    /// Build an engine.
    ///
    /// Without `storage` the engine behaves as if no state was ever recorded
    /// and never caches rephrasings.
    #[builder]
    pub fn new(
        config: Config,
        project: Project,
        storage: Option<Storage>,
        generator: Box<dyn Generator>,
        #[builder(default = bypass_from_env())] bypass: bool,
    ) -> Self {
        let matcher = RuleMatcher::new(&config.rules);
        Self {
            config,
            matcher,
            project,
            storage,
            generator,
            bypass,
            cache_warned: Rc::default(),
        }
    }
}

impl Engine {
    /// Handle one hook event.
    #[tracing::instrument(skip_all, fields(kind = ?envelope.kind))]
    pub fn handle(&self, envelope: &Envelope) -> Result<Response> {
        let Some(kind) = envelope.kind else {
            tracing::debug!("unhandled hook event; allowing");
            return Ok(Response::Allow);
        };
        handler_for(kind)(self, &envelope.event)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    /// Apply the shared short-circuits; `true` means the hook is allowed
    /// without further processing.
    fn short_circuit(&self) -> bool {
        if self.bypass {
            tracing::debug!("{SKIP_ENV} is set; allowing");
            return true;
        }
        if !self.rules_enabled() {
            tracing::debug!("rules are disabled; allowing");
            return true;
        }
        if self.consume_skip_next() {
            tracing::debug!("skipping this hook once; allowing");
            return true;
        }
        false
    }

    fn rules_enabled(&self) -> bool {
        self.read_state("rules enabled", Storage::rules_enabled)
            .unwrap_or(true)
    }

    fn consume_skip_next(&self) -> bool {
        self.read_state("skip next", Storage::consume_skip_next)
            .unwrap_or(false)
    }

    fn operation_state(&self) -> OperationState {
        self.read_state("operation mode", Storage::operation_state)
            .unwrap_or_default()
    }

    /// Run a state store operation, treating failure as "nothing recorded".
    fn read_state<T>(&self, what: &str, read: impl FnOnce(&Storage) -> Result<T>) -> Option<T> {
        let storage = self.storage.as_ref()?;
        match read(storage) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(?error, "read {what} from state store; using the default");
                None
            }
        }
    }

    /// The variables every template in this project can use.
    fn variables(&self) -> Variables {
        template::base_variables(self.project.root())
    }

    /// Render a message template, falling back to the raw text on failure.
    fn render_message(&self, template: &str, vars: &Variables) -> String {
        match template::render(template, vars) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "render message; sending it unrendered");
                template.to_string()
            }
        }
    }

    fn rephraser(&self) -> Rephraser<'_> {
        Rephraser::new(self.generator.as_ref(), self.storage.as_ref())
            .sharing_warnings(self.cache_warned.clone())
    }

    /// Apply a `generate` setting to a rendered message.
    fn rephrase(&self, message: &str, pattern: &str, generate: &Generate) -> String {
        self.rephraser()
            .rephrase(&GenerateRequest::from_setting(message, pattern, generate))
    }
}
