//! End-to-end hook scenarios through the binary.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq as pretty_assert_eq;
use regex::Regex;
use serde_json::json;

use bumpers::storage::CacheEntry;

use crate::{Workspace, bash};

const GO_TEST: &str = r#"
rules:
  - pattern: "go test"
    send: "Use just test instead"
    generate: off
"#;

#[test]
fn test_block_on_go_test() {
    let workspace = Workspace::new(GO_TEST);
    let outcome = workspace.hook(json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Bash",
        "tool_input": {"command": "go test ./..."},
    }));

    pretty_assert_eq!(outcome.code, 2, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(outcome.stdout, "Use just test instead");
}

#[test]
fn test_allow_non_matching() {
    let workspace = Workspace::new(GO_TEST);
    let outcome = workspace.hook(json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Bash",
        "tool_input": {"command": "make test"},
    }));

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(outcome.stdout, "");
}

#[test]
fn test_default_fields_ignore_description() {
    let workspace = Workspace::new("rules:\n  - pattern: rm -rf\n    send: Dangerous\n");
    let outcome = workspace.hook(json!({
        "tool_name": "Bash",
        "tool_input": {"command": "ls", "description": "rm -rf /tmp/test"},
    }));

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(outcome.stdout, "");
}

#[test]
fn test_template_render() {
    let workspace = Workspace::new(
        "rules:\n  - pattern: go test\n    send: 'Blocked: {{.Command}} on {{.Today}}'\n",
    );
    let outcome = workspace.hook(bash("go test ./..."));

    pretty_assert_eq!(outcome.code, 2, "stderr: {}", outcome.stderr);
    let expected = Regex::new(r"^Blocked: go test \./\.\.\. on \d{4}-\d{2}-\d{2}$").unwrap();
    assert!(
        expected.is_match(&outcome.stdout),
        "unexpected message: {:?}",
        outcome.stdout
    );
}

#[test]
fn test_skip_once_consumption() {
    let workspace = Workspace::new(GO_TEST);
    workspace.storage().set_skip_next(true).unwrap();

    let first = workspace.hook(bash("go test ./..."));
    pretty_assert_eq!(first.code, 0, "stderr: {}", first.stderr);
    pretty_assert_eq!(first.stdout, "");
    assert!(!workspace.storage().skip_next().unwrap());

    let second = workspace.hook(bash("go test ./..."));
    pretty_assert_eq!(second.code, 2);
    pretty_assert_eq!(second.stdout, "Use just test instead");
}

#[test]
fn test_session_clear() {
    let workspace = Workspace::new("");
    let entry = |expires_at| CacheEntry {
        generated_message: String::from("Please use just"),
        original_message: String::from("Use just"),
        timestamp: Utc::now(),
        expires_at,
    };
    {
        let storage = workspace.storage();
        storage
            .put_cache_entry("session-entry", &entry(Some(Utc::now() + Duration::hours(1))))
            .unwrap();
        storage.put_cache_entry("durable-entry", &entry(None)).unwrap();
    }

    let outcome = workspace.hook(json!({
        "hook_event_name": "SessionStart",
        "session_id": "test",
        "source": "startup",
    }));
    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);

    let storage = workspace.storage();
    pretty_assert_eq!(storage.cache_entry("session-entry").unwrap(), None);
    let durable = storage.cache_entry("durable-entry").unwrap().unwrap();
    pretty_assert_eq!(durable.generated_message, "Please use just");
    pretty_assert_eq!(durable.expires_at, None);
}

#[test]
fn test_post_tool_informational() {
    let workspace = Workspace::new(
        "rules:\n  - pattern: FAIL\n    event: post\n    send: Tests failed, read the output\n",
    );
    let outcome = workspace.hook(json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Bash",
        "tool_input": {"command": "go test"},
        "tool_response": {"stdout": "--- FAIL: TestX", "stderr": ""},
    }));

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    let output = serde_json::from_str::<serde_json::Value>(&outcome.stdout).unwrap();
    pretty_assert_eq!(
        output,
        json!({
            "hookSpecificOutput": {
                "hookEventName": "PostToolUse",
                "additionalContext": "Tests failed, read the output",
            }
        })
    );
}

#[test]
fn test_malformed_event_exits_one() {
    let workspace = Workspace::new(GO_TEST);
    let outcome = workspace.run(&["hook"], "{not json");

    pretty_assert_eq!(outcome.code, 1);
    pretty_assert_eq!(outcome.stdout, "");
    assert!(
        outcome.stderr.starts_with("bumpers: malformed hook event:"),
        "stderr: {}",
        outcome.stderr
    );
}

#[test]
fn test_unreadable_config_allows() {
    let workspace = Workspace::new("rules: [this is: not valid");
    let outcome = workspace.hook(bash("go test ./..."));

    pretty_assert_eq!(outcome.code, 0);
    pretty_assert_eq!(outcome.stdout, "");
    assert!(outcome.stderr.contains("bumpers:"), "stderr: {}", outcome.stderr);
}

#[test]
fn test_unknown_event_allows() {
    let workspace = Workspace::new(GO_TEST);
    let outcome = workspace.hook(json!({"hook_event_name": "Stop", "session_id": "test"}));

    pretty_assert_eq!(outcome.code, 0);
    pretty_assert_eq!(outcome.stdout, "");
}

#[test]
fn test_null_fields_allow() {
    let workspace = Workspace::new(GO_TEST);
    let outcome = workspace.run(
        &["hook"],
        r#"{"hook_event_name":"UserPromptSubmit","prompt":"hello","tool_name":null}"#,
    );

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(outcome.stdout, "");
}

#[cfg(unix)]
#[test]
fn test_terminated_hook_allows() {
    use std::io::Write;
    use std::process::{Command, Stdio};
    use std::time::{Duration as StdDuration, Instant};

    let workspace = Workspace::new(indoc::indoc! {r#"
        rules:
          - pattern: go test
            send: Use just test instead
            generate: always
        generator:
          command: [sh, -c, "sleep 10"]
          timeout: 30
    "#});

    let mut child = Command::new(env!("CARGO_BIN_EXE_bumpers"))
        .arg("hook")
        .current_dir(workspace.root())
        .env("CLAUDE_PROJECT_DIR", workspace.root())
        .env("BUMPERS_DB", workspace.database())
        .env_remove("BUMPERS_CONFIG")
        .env_remove("BUMPERS_SKIP")
        .env_remove("BUMPERS_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(bash("go test ./...").to_string().as_bytes())
        .unwrap();

    std::thread::sleep(StdDuration::from_secs(1));
    let started = Instant::now();
    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let output = child.wait_with_output().unwrap();
    assert!(started.elapsed() < StdDuration::from_secs(5));
    pretty_assert_eq!(output.status.code(), Some(0));
    pretty_assert_eq!(String::from_utf8_lossy(&output.stdout), "");
}
