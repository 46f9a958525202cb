//! `finder`, the codebase search tool answered by the subagent.

use serde::Deserialize;
use serde_json::json;

use super::{ToolDefinition, ToolError, ToolInput};

/// Name of the search tool
pub const FINDER: &str = "finder";

/// Input of `finder`
#[derive(Debug, Clone, Deserialize)]
pub struct FinderInput {
    /// What to look for
    pub query: String,
}

/// Delegating tool that hands a search query to the subagent.
///
/// The function itself is never the answer; calling it outside an agent
/// reports that a subagent is required.
pub fn finder_tool() -> ToolDefinition {
    ToolDefinition::new(
        FINDER,
        "Intelligently search your codebase: use it for complex, multi-step search tasks where you need to find code based on functionality or concepts rather than exact matches. Describe what you are looking for in plain language.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query describing what to find. Be specific and include technical terms, file types, or expected code patterns."
                }
            },
            "required": ["query"]
        }),
        |input: ToolInput<'_>| {
            let args: FinderInput = input.decode()?;
            Err(ToolError::execution(format!(
                "finder requires a subagent to answer query '{}'",
                args.query
            )))
        },
    )
    .delegating()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finder_is_delegating() {
        let tool = finder_tool();
        assert!(tool.is_delegating());
        assert_eq!(tool.spec().input_schema["required"][0], "query");

        let raw = json!({"query": "where is main"});
        let err = tool.call(ToolInput::new(&raw)).unwrap_err();
        assert!(err.to_string().contains("requires a subagent"));
    }
}
