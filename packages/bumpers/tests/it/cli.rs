//! CLI subcommand smoke tests.

use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::Workspace;

#[test]
fn test_validate_ok() {
    let workspace = Workspace::new("rules:\n  - pattern: go test\n    send: no\n");
    let outcome = workspace.run(&["validate"], "");

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    assert!(outcome.stdout.contains("1 valid rules"), "stdout: {}", outcome.stdout);
}

#[test]
fn test_validate_reports_invalid_regex() {
    let workspace = Workspace::new(
        "rules:\n  - pattern: go test\n    send: ok\n  - pattern: '(unclosed'\n    send: broken\n",
    );
    let outcome = workspace.run(&["validate"], "");

    pretty_assert_eq!(outcome.code, 1);
    assert!(
        outcome.stdout.contains("1 valid rules, 1 invalid rule(s); first failure in rule 2"),
        "stdout: {}",
        outcome.stdout
    );
}

#[test]
fn test_validate_missing_config() {
    let workspace = Workspace::new("");
    std::fs::remove_file(workspace.root().join("bumpers.yml")).unwrap();
    let outcome = workspace.run(&["validate"], "");

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    assert!(outcome.stdout.contains("0 valid rules"), "stdout: {}", outcome.stdout);
}

#[test]
fn test_validate_other_config_file() {
    let workspace = Workspace::new("");
    std::fs::write(
        workspace.root().join("strict.yml"),
        "rules:\n  - pattern: a\n    send: b\n  - pattern: c\n    send: d\n",
    )
    .unwrap();
    let outcome = workspace.run(&["validate", "--config", "strict.yml"], "");

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    assert!(outcome.stdout.contains("2 valid rules"), "stdout: {}", outcome.stdout);
}

#[test]
fn test_test_subcommand_match() {
    let workspace = Workspace::new(
        "rules:\n  - pattern: go test\n    send: 'Use just test, not {{.Command}}'\n",
    );
    let outcome = workspace.run(&["test", "go test ./..."], "");

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    assert!(outcome.stdout.contains("rule 1 matched"), "stdout: {}", outcome.stdout);
    assert!(
        outcome.stdout.contains("Use just test, not go test ./..."),
        "stdout: {}",
        outcome.stdout
    );
}

#[test]
fn test_test_subcommand_tool_filter() {
    let workspace = Workspace::new(
        "rules:\n  - pattern: go test\n    tool: ^Bash$\n    send: no\n",
    );
    let outcome = workspace.run(&["test", "--tool", "Write", "go test"], "");

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    pretty_assert_eq!(outcome.stdout.trim(), "Result: no rule matched");
}

#[test]
fn test_failing_command_suggests_next_step() {
    let workspace = Workspace::new("rules: [this is: not valid");
    let outcome = workspace.run(&["test", "go test"], "");

    assert!(outcome.code != 0, "stdout: {}", outcome.stdout);
    assert!(
        outcome.stderr.contains("Run `bumpers validate` to check the rules"),
        "stderr: {}",
        outcome.stderr
    );
}
