//! Prompt commands through the binary.

use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::{Workspace, prompt};

const COMMANDS: &str = r#"
commands:
  - name: review
    send: "Review {{.Command}} carefully ({{.Argc}} file(s))"
"#;

#[test]
fn test_command_adds_context() {
    let workspace = Workspace::new(COMMANDS);
    let outcome = workspace.hook(prompt("$review src/lib.rs"));

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    let output = serde_json::from_str::<serde_json::Value>(&outcome.stdout).unwrap();
    pretty_assert_eq!(
        output["hookSpecificOutput"]["hookEventName"],
        "UserPromptSubmit"
    );
    pretty_assert_eq!(
        output["hookSpecificOutput"]["additionalContext"],
        "Review src/lib.rs carefully (1 file(s))"
    );
}

#[test]
fn test_plain_prompt_is_silent() {
    let workspace = Workspace::new(COMMANDS);
    let outcome = workspace.hook(prompt("please review src/lib.rs"));

    pretty_assert_eq!(outcome.code, 0);
    pretty_assert_eq!(outcome.stdout, "");
}

#[test]
fn test_unknown_builtin_falls_through() {
    let workspace = Workspace::new(COMMANDS);
    let outcome = workspace.hook(prompt("bumpers explode"));

    pretty_assert_eq!(outcome.code, 0);
    pretty_assert_eq!(outcome.stdout, "");
}
