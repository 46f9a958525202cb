//! Filesystem tools: `read_file` and `list_files`.

use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use super::{ToolCallResult, ToolDefinition, ToolError, ToolInput};

/// Name of the file reading tool
pub const READ_FILE: &str = "read_file";
/// Name of the directory listing tool
pub const LIST_FILES: &str = "list_files";

/// Input of `read_file`
#[derive(Debug, Deserialize)]
pub struct ReadFileInput {
    /// Relative path of the file
    pub path: String,
}

/// Input of `list_files`
#[derive(Debug, Default, Deserialize)]
pub struct ListFilesInput {
    /// Directory to list; the working directory when absent
    #[serde(default)]
    pub path: Option<String>,
}

/// Tool returning the contents of a file
pub fn read_file_tool() -> ToolDefinition {
    ToolDefinition::new(
        READ_FILE,
        "Read the contents of a given relative file path. Use this when you want to see what's inside a file. Do not use this with directory names.",
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The relative path of a file in the working directory."
                }
            },
            "required": ["path"]
        }),
        read_file,
    )
}

/// Tool listing files below a directory
pub fn list_files_tool() -> ToolDefinition {
    ToolDefinition::new(
        LIST_FILES,
        "List files and directories at a given path. If no path is provided, lists files in the current directory.",
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Optional relative path to list files from. Defaults to current directory if not provided."
                }
            }
        }),
        list_files,
    )
}

fn read_file(input: ToolInput<'_>) -> ToolCallResult<String> {
    let args: ReadFileInput = input.decode()?;
    Ok(std::fs::read_to_string(&args.path)?)
}

fn list_files(input: ToolInput<'_>) -> ToolCallResult<String> {
    let args: ListFilesInput = if input.raw_input.is_null() {
        ListFilesInput::default()
    } else {
        input.decode()?
    };

    let root = match args.path.as_deref() {
        Some(path) if !path.is_empty() => path,
        _ => ".",
    };
    let root = Path::new(root);
    if !root.is_dir() {
        return Err(ToolError::execution(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort();
    Ok(entries.join("\n"))
}

/// Collect entries below `dir` relative to `root`, skipping `.git`.
fn walk(root: &Path, dir: &Path, entries: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if entry.file_type()?.is_dir() {
            entries.push(format!("{}/", relative));
            walk(root, &path, entries)?;
        } else {
            entries.push(relative);
        }
    }
    Ok(())
}
