//! Validate the rules in a config file.

use clap::Args;
use color_eyre::eyre::{Context, Result};

use bumpers::config::validate_config;

use super::ProjectArgs;

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn main(config: Config) -> Result<()> {
    let project = config.project.project(None)?;
    let path = project.root().join(&config.project.config);
    let loaded = config.project.load_config(&project).context("load config")?;

    let validation = validate_config(&loaded);
    println!("Config file: {path:?}");
    println!("{validation}");
    for invalid in &validation.invalid {
        println!("  rule {}: {:?}: {}", invalid.index + 1, invalid.regex, invalid.error);
    }

    if !validation.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
