//! Default tool-input fields checked when a rule has no `sources`.
//!
//! The lists deliberately leave out fields that cause false positives: `Bash`
//! skips `description` (free-form prose about the command) and `Edit` skips
//! `old_string` (the text being removed, not introduced).

/// Ordered default fields per tool.
const DEFAULT_FIELDS: &[(&str, &[&str])] = &[
    ("Bash", &["command"]),
    ("Edit", &["file_path", "new_string"]),
    ("Write", &["file_path", "content"]),
    ("Read", &["file_path"]),
    ("Grep", &["pattern", "path"]),
    ("Glob", &["pattern", "path"]),
    ("MultiEdit", &["file_path", "edits"]),
    ("NotebookEdit", &["notebook_path", "new_source"]),
    ("LS", &["path"]),
    ("WebFetch", &["url", "prompt"]),
    ("WebSearch", &["query"]),
    ("TodoWrite", &["todos"]),
    ("Task", &["subagent_type", "prompt"]),
];

/// Tools that modify files, blocked outright while in plan mode.
pub const EDITING_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit", "NotebookEdit"];

/// Get the default fields for a tool, if the tool is known.
pub fn default_fields(tool_name: &str) -> Option<&'static [&'static str]> {
    DEFAULT_FIELDS
        .iter()
        .find(|(tool, _)| *tool == tool_name)
        .map(|(_, fields)| *fields)
}

/// Whether the tool modifies files.
pub fn is_editing_tool(tool_name: &str) -> bool {
    EDITING_TOOLS.contains(&tool_name)
}
