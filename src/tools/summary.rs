//! One-line, human-readable summaries of tool calls.

use serde_json::Value;

use super::{finder, fs, plan};

const SUCCESS_MARKER: &str = "✓";
const ERROR_MARKER: &str = "✗";

/// Summarize a finished tool call as a newline-terminated line.
///
/// Known tools get a short label and their key argument; anything else is
/// shown by name.
pub fn format_tool_result_message(name: &str, input: &Value, is_error: bool) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    let (label, detail) = match name {
        fs::READ_FILE => ("Read", field("path")),
        "edit_file" => ("Edit", field("path")),
        fs::LIST_FILES => {
            let path = field("path");
            ("List", if path.is_empty() { ".".to_string() } else { path })
        }
        "bash" => ("Bash", field("command")),
        finder::FINDER => ("Finder", field("query")),
        "grep_search" => ("Grep", field("pattern")),
        plan::PLAN_READ | plan::PLAN_WRITE => ("Plan", String::new()),
        other => (other, String::new()),
    };

    let marker = if is_error { ERROR_MARKER } else { SUCCESS_MARKER };
    if detail.is_empty() {
        format!("{} {}\n", marker, label)
    } else {
        format!("{} {} {}\n", marker, label, detail)
    }
}
