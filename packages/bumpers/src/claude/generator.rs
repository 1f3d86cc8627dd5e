//! Rephrase messages by running Claude Code in print mode.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use bon::Builder;
use color_eyre::eyre::{Context, Result, bail, eyre};

use crate::rephrase::Generator;

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external command with the prompt on stdin and reads the reply
/// from stdout.
#[derive(Debug, Clone, Builder)]
pub struct ClaudeGenerator {
    /// Program and arguments, for example `["claude", "-p"]`.
    #[builder(default = vec![String::from("claude"), String::from("-p")])]
    command: Vec<String>,

    /// How long the command may run before it is killed.
    #[builder(default = Duration::from_secs(30))]
    timeout: Duration,
}

impl Generator for ClaudeGenerator {
    #[tracing::instrument(name = "ClaudeGenerator::generate", skip_all, fields(command = ?self.command))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("generator command is empty");
        };
        let deadline = Instant::now() + self.timeout;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn generator: {program}"))?;

        let mut stdin = child.stdin.take().ok_or_else(|| eyre!("capture generator stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| eyre!("capture generator stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| eyre!("capture generator stderr"))?;

        // The pipes are serviced on detached threads: processes the generator
        // spawns may hold them open after it exits, and every wait below is
        // bounded by the deadline instead.
        let prompt = prompt.to_string();
        thread::spawn(move || {
            if let Err(error) = stdin.write_all(prompt.as_bytes()).and_then(|()| stdin.flush()) {
                tracing::debug!(?error, "write prompt to generator");
            }
        });
        let output = drain(stdout);
        let errors = drain(stderr);

        let status = wait_until(&mut child, deadline)?;
        let output = receive(&output, deadline)?;
        if !status.success() {
            let errors = receive(&errors, deadline).unwrap_or_default();
            let errors = String::from_utf8_lossy(&errors);
            bail!("generator exited with {status}: {}", errors.trim());
        }

        let output = String::from_utf8_lossy(&output).trim().to_string();
        if output.is_empty() {
            bail!("generator returned empty output");
        }
        Ok(output)
    }
}

/// Read a pipe to the end on a detached thread.
fn drain(mut pipe: impl Read + Send + 'static) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(error) = pipe.read_to_end(&mut buf) {
            tracing::debug!(?error, "read generator output");
        }
        let _ = sender.send(buf);
    });
    receiver
}

/// Wait for a drained pipe to close, up to the deadline.
fn receive(pipe: &Receiver<Vec<u8>>, deadline: Instant) -> Result<Vec<u8>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match pipe.recv_timeout(remaining) {
        Ok(buf) => Ok(buf),
        Err(RecvTimeoutError::Timeout) => bail!("generator timed out waiting for its output"),
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
    }
}

/// Poll the child until it exits; kill it once the deadline passes.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<ExitStatus> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("wait for generator")? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            if let Err(error) = child.kill() {
                tracing::debug!(?error, "kill generator");
            }
            // Reap the direct child; the exit status does not block on pipes.
            let _ = child.wait();
            return Err(eyre!("generator timed out after {:?}", started.elapsed()));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
