//! Bumpers keeps your agents on the rails.

use color_eyre::{Result, Section};
use tracing::{instrument, level_filters::LevelFilter};

mod cmd;

use bumpers::engine::BuiltinCommand;
use clap::{Parser, Subcommand};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Bumpers guards your agents' tool calls with project rules.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Respond to a hook event read from stdin.
    Hook(cmd::hook::Config),

    /// Validate the rules in the config file.
    Validate(cmd::validate::Config),

    /// Test the configured rules against sample text.
    Test(cmd::test::Config),

    /// Evaluate rules again after `disable`.
    Enable(cmd::builtin::Config),

    /// Stop evaluating rules until `enable`.
    Disable(cmd::builtin::Config),

    /// Show whether rules are enabled and the current operation mode.
    Status(cmd::builtin::Config),

    /// Allow the next hook without evaluating rules.
    Skip(cmd::builtin::Config),
}

#[instrument]
fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // The assistant runs `bumpers hook` as a subprocess and shows its stderr
    // to the user, so only warnings are logged by default. Use `BUMPERS_LOG`
    // directives (`BUMPERS_LOG=debug`, `BUMPERS_LOG=bumpers=trace`) for
    // manual debugging.
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .pretty(),
        )
        .with(
            EnvFilter::builder()
                .with_env_var("BUMPERS_LOG")
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    // Only failing commands carry the suggestion; a hook that allows or
    // blocks returns normally.
    match cli.command {
        Commands::Hook(config) => cmd::hook::main(config),
        Commands::Validate(config) => cmd::validate::main(config),
        Commands::Test(config) => cmd::test::main(config),
        Commands::Enable(config) => cmd::builtin::main(BuiltinCommand::Enable, config),
        Commands::Disable(config) => cmd::builtin::main(BuiltinCommand::Disable, config),
        Commands::Status(config) => cmd::builtin::main(BuiltinCommand::Status, config),
        Commands::Skip(config) => cmd::builtin::main(BuiltinCommand::Skip, config),
    }
    .suggestion("Run `bumpers validate` to check the rules, or set BUMPERS_LOG=debug for details.")
}
