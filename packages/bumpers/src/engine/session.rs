//! Add session notes when a session starts.

use color_eyre::eyre::Result;
use itertools::Itertools;

use crate::claude::hook::{HookEvent, HookKind, Response};
use crate::rephrase::GenerateRequest;

use super::Engine;

/// Whether a session start of the given source gets notes.
///
/// Resumed sessions already carry the notes from when they started.
fn is_fresh(source: Option<&str>) -> bool {
    matches!(source, Some("startup" | "clear"))
}

#[tracing::instrument(name = "session::handle", skip_all, fields(source = ?event.source))]
pub(super) fn handle(engine: &Engine, event: &HookEvent) -> Result<Response> {
    if !is_fresh(event.source.as_deref()) {
        tracing::debug!("not a fresh session; allowing");
        return Ok(Response::Allow);
    }

    if let Some(storage) = engine.storage() {
        match storage.clear_session_entries() {
            Ok(removed) => tracing::debug!(removed, "cleared session rephrasings"),
            Err(error) => tracing::warn!(?error, "clear session rephrasings"),
        }
    }

    let vars = engine.variables();
    let rephraser = engine.rephraser();
    let notes = engine
        .config
        .session
        .iter()
        .map(|note| {
            let message = engine.render_message(&note.add, &vars);
            rephraser.rephrase(&GenerateRequest::from_setting(
                &message,
                &note.add,
                &note.generate,
            ))
        })
        .filter(|note| !note.trim().is_empty())
        .join("\n");

    Ok(Response::informational(HookKind::SessionStart, notes))
}
