//! CLI subcommands.

use std::path::{Path, PathBuf};

use bumpers::{
    claude::generator::ClaudeGenerator,
    config::{Config, DEFAULT_CONFIG_FILE},
    engine::Engine,
    project::Project,
    storage::{self, Storage},
};
use clap::Args;
use color_eyre::eyre::{Context, OptionExt, Result};

pub mod builtin;
pub mod hook;
pub mod validate;

/// Where to find the project, its config, and the state store.
#[derive(Args, Clone, Debug)]
pub struct ProjectArgs {
    /// The project root. Defaults to the hook event's `cwd`, then the
    /// current directory.
    #[arg(long, env = "CLAUDE_PROJECT_DIR")]
    pub project_root: Option<PathBuf>,

    /// The config file. Relative paths resolve against the project root.
    #[arg(long, env = "BUMPERS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// The state database. Defaults to `bumpers.db` in the user data
    /// directory.
    #[arg(long, env = "BUMPERS_DB")]
    pub database: Option<PathBuf>,
}

impl ProjectArgs {
    /// Identify the project, preferring the explicit root over `fallback`.
    pub fn project(&self, fallback: Option<&Path>) -> Result<Project> {
        let root = match (&self.project_root, fallback) {
            (Some(root), _) => root.clone(),
            (None, Some(fallback)) => fallback.to_path_buf(),
            (None, None) => std::env::current_dir().context("get current directory")?,
        };
        Project::from_root(&root)
    }

    /// Load the project's config.
    pub fn load_config(&self, project: &Project) -> Result<Config> {
        Config::load_from(&project.root().join(&self.config))
    }

    /// Open the state store for the project.
    pub fn open_storage(&self, project: &Project) -> Result<Storage> {
        let path = match &self.database {
            Some(path) => path.clone(),
            None => storage::default_database_path().ok_or_eyre("locate user data directory")?,
        };
        Storage::open(&path, project.id())
    }

    /// Build an engine for the project.
    ///
    /// An unavailable state store is not fatal: the engine runs without one.
    pub fn engine(&self, fallback_root: Option<&Path>) -> Result<Engine> {
        let project = self.project(fallback_root)?;
        let config = self.load_config(&project).context("load config")?;

        let storage = match self.open_storage(&project) {
            Ok(storage) => Some(storage),
            Err(error) => {
                tracing::warn!(?error, "state store unavailable; using default state");
                None
            }
        };

        let generator = ClaudeGenerator::builder().timeout(config.generator.timeout());
        let generator = match config.generator.argv() {
            Ok(argv) => generator.command(argv).build(),
            Err(error) => {
                tracing::warn!(?error, "invalid generator command; using the default");
                generator.build()
            }
        };

        Ok(Engine::builder()
            .config(config)
            .project(project)
            .maybe_storage(storage)
            .generator(Box::new(generator))
            .build())
    }
}
