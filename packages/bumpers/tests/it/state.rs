//! Operator state persisted across hook processes.

use pretty_assertions::assert_eq as pretty_assert_eq;
use serde_json::json;

use bumpers::storage::{OperationMode, Storage};

use crate::{Workspace, bash, prompt};

const GO_TEST: &str = "rules:\n  - pattern: go test\n    send: Use just test instead\n";

fn additional_context(stdout: &str) -> String {
    let output = serde_json::from_str::<serde_json::Value>(stdout).unwrap();
    output["hookSpecificOutput"]["additionalContext"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_disable_then_enable_from_cli() {
    let workspace = Workspace::new(GO_TEST);

    let disable = workspace.run(&["disable"], "");
    pretty_assert_eq!(disable.code, 0, "stderr: {}", disable.stderr);
    pretty_assert_eq!(
        disable.stdout.trim(),
        "bumpers: rules disabled until `bumpers enable`"
    );
    pretty_assert_eq!(workspace.hook(bash("go test")).code, 0);

    let enable = workspace.run(&["enable"], "");
    pretty_assert_eq!(enable.code, 0, "stderr: {}", enable.stderr);
    pretty_assert_eq!(workspace.hook(bash("go test")).code, 2);
}

#[test]
fn test_disable_from_prompt() {
    let workspace = Workspace::new(GO_TEST);

    let outcome = workspace.hook(prompt("bumpers disable"));
    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(
        additional_context(&outcome.stdout),
        "bumpers: rules disabled until `bumpers enable`"
    );
    assert!(!workspace.storage().rules_enabled().unwrap());
    pretty_assert_eq!(workspace.hook(bash("go test")).stdout, "");
}

#[test]
fn test_skip_from_cli() {
    let workspace = Workspace::new(GO_TEST);

    pretty_assert_eq!(workspace.run(&["skip"], "").code, 0);
    pretty_assert_eq!(workspace.hook(bash("go test")).code, 0);
    pretty_assert_eq!(workspace.hook(bash("go test")).code, 2);
}

#[test]
fn test_status_reports_state() {
    let workspace = Workspace::new(GO_TEST);
    workspace.storage().set_skip_next(true).unwrap();

    let outcome = workspace.run(&["status"], "");
    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(
        outcome.stdout.trim(),
        "bumpers: rules enabled; 1 rule(s) loaded; next hook will be skipped; mode execute (0 trigger(s))"
    );
    assert!(workspace.storage().skip_next().unwrap());
}

#[test]
fn test_emergency_stop_then_trigger() {
    let workspace = Workspace::new(GO_TEST);
    let edit = json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Edit",
        "tool_input": {"file_path": "src/main.rs", "old_string": "a", "new_string": "b"},
    });

    pretty_assert_eq!(workspace.hook(prompt("STOP, that's wrong")).code, 0);
    pretty_assert_eq!(
        workspace.storage().operation_state().unwrap().mode,
        OperationMode::Plan
    );
    let blocked = workspace.hook(edit.clone());
    pretty_assert_eq!(blocked.code, 2);
    assert!(blocked.stdout.contains("Plan mode"), "stdout: {}", blocked.stdout);

    pretty_assert_eq!(workspace.hook(prompt("Looks good, make it so")).code, 0);
    let state = workspace.storage().operation_state().unwrap();
    pretty_assert_eq!(state.mode, OperationMode::Execute);
    pretty_assert_eq!(state.trigger_count, 1);
    pretty_assert_eq!(workspace.hook(edit).code, 0);
}

#[test]
fn test_state_is_per_project() {
    let workspace = Workspace::new(GO_TEST);
    pretty_assert_eq!(workspace.run(&["disable"], "").code, 0);

    let other = Storage::open(&workspace.database(), "another-project").unwrap();
    assert!(!workspace.storage().rules_enabled().unwrap());
    assert!(other.rules_enabled().unwrap());
}
