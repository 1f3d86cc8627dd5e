//! Template interpolation for rule messages, commands, and session notes.
//!
//! Supports a single action form: `{{.Name}}` (whitespace inside the braces is
//! allowed, so `{{ .Name }}` works too). Each action is replaced with the value
//! bound to `Name` in the provided [`Variables`].
//!
//! Variables that are always available to handlers:
//! - `Today`: the current local date as `YYYY-MM-DD`
//! - `ProjectRoot`: the absolute path of the project
//!
//! Handlers add their own bindings on top (for example `Command` for the text
//! matched by a rule).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Local;
use derive_more::{Display, Error};

/// Upper bound on both the template source and its rendered output.
pub const MAX_TEMPLATE_BYTES: usize = 32 * 1024;

/// Named values available to a template.
pub type Variables = BTreeMap<String, String>;

/// Failure to render a template.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TemplateError {
    /// The template or its rendered output exceeds [`MAX_TEMPLATE_BYTES`].
    #[display("template too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The template contains an action this evaluator does not understand.
    #[display("parse template at byte {offset}: {reason}")]
    Parse { offset: usize, reason: String },
}

/// Build the variables every template can reference.
pub fn base_variables(project_root: &Path) -> Variables {
    Variables::from([
        (String::from("Today"), today()),
        (
            String::from("ProjectRoot"),
            project_root.display().to_string(),
        ),
    ])
}

/// The current local date as `YYYY-MM-DD`.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Whether the string contains template syntax and must be rendered.
pub fn has_actions(s: &str) -> bool {
    s.contains("{{")
}

/// Render a template with the given variables.
///
/// Names without a binding render as an empty string.
///
/// # Examples
///
/// ```
/// use bumpers::template::{render, Variables};
///
/// let vars = Variables::from([("Command".to_string(), "go test".to_string())]);
/// let result = render("Blocked: {{.Command}}", &vars).unwrap();
/// assert_eq!(result, "Blocked: go test");
/// ```
pub fn render(template: &str, vars: &Variables) -> Result<String, TemplateError> {
    check_size(template.len())?;

    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);

        let action_start = offset + start;
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(TemplateError::Parse {
                offset: action_start,
                reason: String::from("unclosed action"),
            });
        };

        let name = parse_action(after_open[..end].trim()).ok_or_else(|| TemplateError::Parse {
            offset: action_start,
            reason: format!("unsupported action `{}`", after_open[..end].trim()),
        })?;

        match vars.get(name) {
            Some(value) => output.push_str(value),
            None => tracing::debug!(name, "template variable has no binding"),
        }
        check_size(output.len())?;

        let consumed = start + 2 + end + 2;
        rest = &rest[consumed..];
        offset += consumed;
    }

    output.push_str(rest);
    check_size(output.len())?;
    Ok(output)
}

/// Parse the inside of an action (`.Name`) into the variable name.
fn parse_action(action: &str) -> Option<&str> {
    let name = action.strip_prefix('.')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(name)
}

fn check_size(size: usize) -> Result<(), TemplateError> {
    if size > MAX_TEMPLATE_BYTES {
        return Err(TemplateError::TooLarge {
            size,
            limit: MAX_TEMPLATE_BYTES,
        });
    }
    Ok(())
}
