//! Decide whether a proposed tool call may run.

use color_eyre::eyre::Result;
use indoc::indoc;

use crate::claude::hook::{HookEvent, Response};
use crate::claude::transcript::LazyIntent;
use crate::rules::fields::is_editing_tool;
use crate::storage::OperationMode;

use super::Engine;

/// Sent instead of running rules when an editing tool is used in plan mode.
pub const PLAN_MODE_MESSAGE: &str = indoc! {"
    Plan mode is active, so file edits are blocked.
    Finish planning and present the plan to the user. Editing resumes once the
    user approves it by saying \"make it so\" or \"go ahead\"."};

#[tracing::instrument(name = "pre_tool::handle", skip_all, fields(tool = %event.tool_name))]
pub(super) fn handle(engine: &Engine, event: &HookEvent) -> Result<Response> {
    if engine.short_circuit() {
        return Ok(Response::Allow);
    }

    if engine.operation_state().mode == OperationMode::Plan && is_editing_tool(&event.tool_name) {
        tracing::debug!("blocking editing tool in plan mode");
        return Ok(Response::block(PLAN_MODE_MESSAGE));
    }

    let intent = LazyIntent::new(event.transcript(), event.tool_use());
    let mut vars = engine.variables();
    vars.insert(String::from("ToolName"), event.tool_name.clone());

    let Some(found) =
        engine
            .matcher
            .match_pre_tool(&event.tool_name, &event.tool_input, &intent, &vars)
    else {
        return Ok(Response::Allow);
    };

    vars.insert(String::from("Command"), found.matched_text.clone());
    let message = engine.render_message(&found.rule.send, &vars);
    let message = engine.rephrase(&message, &found.rule.pattern, &found.rule.generate);
    Ok(Response::block(message))
}
