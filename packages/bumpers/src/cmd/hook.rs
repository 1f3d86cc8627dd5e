//! Respond to a hook event read from stdin.
//!
//! The response goes to stdout and the process exit code carries the
//! decision: `0` allows, `2` blocks. A malformed event exits with `1`;
//! any other failure is reported on stderr and the hook allowed. An
//! interrupt or termination signal also allows.

use std::io::{Read, Write};

use clap::Args;
use color_eyre::eyre::{Context, Result};

use bumpers::claude::hook::{Envelope, Response};

use super::ProjectArgs;

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn main(config: Config) -> Result<()> {
    if let Err(error) = ctrlc::set_handler(allow_on_signal) {
        tracing::warn!(?error, "install signal handler");
    }

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("read hook event from stdin")?;

    let envelope = match Envelope::parse(&raw) {
        Ok(envelope) => envelope,
        Err(error) => {
            eprintln!("bumpers: malformed hook event: {error:#}");
            std::process::exit(1);
        }
    };
    tracing::debug!(kind = ?envelope.kind, "read hook event");

    let response = match respond(&config, &envelope) {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(?error, "process hook event; allowing");
            eprintln!("bumpers: {error:#}");
            Response::Allow
        }
    };

    let code = emit(&response)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Exit as an allow: no decision has been written yet.
fn allow_on_signal() {
    tracing::debug!("interrupted; allowing");
    let _ = std::io::stdout().lock().flush();
    std::process::exit(0);
}

fn respond(config: &Config, envelope: &Envelope) -> Result<Response> {
    let engine = config.project.engine(envelope.event.cwd.as_deref())?;
    engine.handle(envelope)
}

/// Write the response to stdout and return the exit code to use.
fn emit(response: &Response) -> Result<i32> {
    let rendered = response.render()?;
    let mut stdout = std::io::stdout().lock();
    match response {
        Response::Allow => {}
        Response::Block { .. } => write!(stdout, "{rendered}").context("write response")?,
        Response::Informational { .. } => writeln!(stdout, "{rendered}").context("write response")?,
    }
    stdout.flush().context("flush stdout")?;
    Ok(response.exit_code())
}
