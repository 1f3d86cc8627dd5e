//! Control bumpers from the command line.

use clap::Args;
use color_eyre::eyre::Result;

use bumpers::engine::BuiltinCommand;

use super::ProjectArgs;

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn main(command: BuiltinCommand, config: Config) -> Result<()> {
    let engine = config.project.engine(None)?;
    let message = engine.process_builtin_command(command)?;
    println!("{message}");
    Ok(())
}
