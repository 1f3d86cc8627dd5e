//! Add advisory context after a tool call completes.

use color_eyre::eyre::Result;

use crate::claude::hook::{HookEvent, HookKind, Response};
use crate::claude::transcript::LazyIntent;
use crate::rules::{IntentSource, RuleEvent};

use super::Engine;

#[tracing::instrument(name = "post_tool::handle", skip_all, fields(tool = %event.tool_name))]
pub(super) fn handle(engine: &Engine, event: &HookEvent) -> Result<Response> {
    if engine.short_circuit() {
        return Ok(Response::Allow);
    }
    if !engine.matcher.has_rules_for(RuleEvent::Post) {
        return Ok(Response::Allow);
    }

    let response = event.response_fields();
    let intent = LazyIntent::new(event.transcript(), event.tool_use());
    let needs_intent = engine.matcher.uses_intent(RuleEvent::Post);
    if response.is_empty() && (!needs_intent || intent.intent().is_empty()) {
        tracing::debug!("no tool response or intent to match");
        return Ok(Response::Allow);
    }

    let mut vars = engine.variables();
    vars.insert(String::from("ToolName"), event.tool_name.clone());

    let Some(found) = engine
        .matcher
        .match_post_tool(&event.tool_name, &response, &intent, &vars)
    else {
        return Ok(Response::Allow);
    };

    vars.insert(String::from("Command"), found.matched_text.clone());
    let message = engine.render_message(&found.rule.send, &vars);
    let message = engine.rephrase(&message, &found.rule.pattern, &found.rule.generate);
    Ok(Response::informational(HookKind::PostToolUse, message))
}
