//! Session notes through the binary.

use pretty_assertions::assert_eq as pretty_assert_eq;
use serde_json::json;

use crate::Workspace;

fn start(source: &str) -> serde_json::Value {
    json!({"hook_event_name": "SessionStart", "session_id": "test", "source": source})
}

#[test]
fn test_notes_on_startup() {
    let workspace = Workspace::new(
        "session:\n  - add: 'Project root is {{.ProjectRoot}}'\n  - add: Run just test before committing\n",
    );
    let outcome = workspace.hook(start("startup"));

    pretty_assert_eq!(outcome.code, 0, "stderr: {}", outcome.stderr);
    let output = serde_json::from_str::<serde_json::Value>(&outcome.stdout).unwrap();
    pretty_assert_eq!(output["hookSpecificOutput"]["hookEventName"], "SessionStart");

    let context = output["hookSpecificOutput"]["additionalContext"]
        .as_str()
        .unwrap();
    let root = workspace.root().canonicalize().unwrap();
    pretty_assert_eq!(
        context,
        format!(
            "Project root is {}\nRun just test before committing",
            root.display()
        )
    );
}

#[test]
fn test_resume_is_silent() {
    let workspace = Workspace::new("session:\n  - add: hello\n");
    let outcome = workspace.hook(start("resume"));

    pretty_assert_eq!(outcome.code, 0);
    pretty_assert_eq!(outcome.stdout, "");
}

#[cfg(unix)]
#[test]
fn test_session_rephrase_cached_until_cleared() {
    let dir = tempfile::TempDir::new().unwrap();
    let calls = dir.path().join("calls");
    let workspace = Workspace::new(&indoc::formatdoc! {r#"
            session:
              - add: Run just test before committing
                generate: session
            commands:
              - name: tip
                send: Run just test before committing
                generate: session
            generator:
              command: ["sh", "-c", "cat > /dev/null; echo call >> '{}'; echo Remember to run just test"]
        "#,
        calls.display()
    });
    let count = || {
        std::fs::read_to_string(&calls)
            .map(|content| content.lines().count())
            .unwrap_or(0)
    };

    let tip = workspace.hook(crate::prompt("$tip"));
    pretty_assert_eq!(tip.code, 0, "stderr: {}", tip.stderr);
    assert!(tip.stdout.contains("Remember to run just test"), "stdout: {}", tip.stdout);
    workspace.hook(crate::prompt("$tip"));
    pretty_assert_eq!(count(), 1);

    // Startup purges session entries and generates the note.
    workspace.hook(start("startup"));
    pretty_assert_eq!(count(), 2);
    workspace.hook(crate::prompt("$tip"));
    pretty_assert_eq!(count(), 3);
    workspace.hook(crate::prompt("$tip"));
    pretty_assert_eq!(count(), 3);
}
