//! Tool dispatch for one `ToolUse`.
//!
//! Routing order: MCP proxy first, then the local registry. Every outcome,
//! failures included, becomes a `ToolResult` block so the model always gets
//! an answer for each call it made.

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Agent;
use crate::inference::DeltaHandler;
use crate::mcp::{McpError, McpToolDetails};
use crate::message::{ContentBlock, ToolResult, ToolUse};
use crate::state::UiState;
use crate::store::Plan;
use crate::tools::{
    format_tool_result_message, ToolCallResult, ToolDefinition, ToolError, ToolInput, ToolKind,
};

/// Content sent back when an MCP tool answers with nothing
pub const EMPTY_MCP_RESULT: &str = "Tool executed successfully but returned no content";

/// Content sent back when the name matches no known tool
pub const TOOL_NOT_FOUND: &str = "tool not found";

impl Agent {
    /// Answer one tool call and emit its summary line.
    pub(super) async fn dispatch(
        &mut self,
        cancel: &CancellationToken,
        tool_use: &ToolUse,
        on_delta: DeltaHandler<'_>,
    ) -> ContentBlock {
        let result = match self.mcp.get(&tool_use.name).cloned() {
            Some(details) => self.execute_mcp(cancel, &details, tool_use).await,
            None => self.execute_local(cancel, tool_use).await,
        };

        info!(
            tool = %tool_use.name,
            tool_use_id = %tool_use.id,
            is_error = result.is_error,
            "tool executed"
        );
        session_log!(self, |logger| logger.log_tool_execution(
            &tool_use.name,
            &tool_use.input.to_string(),
            &result.content,
            !result.is_error,
        ));

        on_delta(&format_tool_result_message(
            &tool_use.name,
            &tool_use.input,
            result.is_error,
        ));
        ContentBlock::ToolResult(result)
    }

    async fn execute_mcp(
        &self,
        cancel: &CancellationToken,
        details: &McpToolDetails,
        tool_use: &ToolUse,
    ) -> ToolResult {
        let args = match &tool_use.input {
            Value::Object(args) => args.clone(),
            other => {
                if !other.is_null() {
                    warn!(
                        tool = %tool_use.name,
                        "MCP tool input is not an object, sending no arguments"
                    );
                }
                Map::new()
            }
        };

        debug!(tool = %tool_use.name, server = details.server.name(), "calling MCP tool");
        let call = details.server.call(cancel, &tool_use.name, args);
        let outcome = match self.delegation_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(McpError::Timeout(limit)),
            },
            None => call.await,
        };

        match outcome {
            Ok(Value::Null) => tool_result(tool_use, EMPTY_MCP_RESULT, false),
            Ok(Value::String(text)) if text.is_empty() => {
                tool_result(tool_use, EMPTY_MCP_RESULT, false)
            }
            Ok(Value::String(text)) => tool_result(tool_use, text, false),
            Ok(value) => tool_result(tool_use, value.to_string(), false),
            Err(e) => tool_result(
                tool_use,
                format!("MCP tool {} execution error: {}", tool_use.name, e),
                true,
            ),
        }
    }

    async fn execute_local(
        &mut self,
        cancel: &CancellationToken,
        tool_use: &ToolUse,
    ) -> ToolResult {
        let Some(definition) = self.registry.find(&tool_use.name).cloned() else {
            warn!(tool = %tool_use.name, "model requested an unknown tool");
            return tool_result(tool_use, TOOL_NOT_FOUND, true);
        };

        let outcome = match definition.kind() {
            ToolKind::Delegating => {
                return self
                    .execute_delegating(cancel, &definition, tool_use)
                    .await;
            }
            ToolKind::Plan => self.execute_plan_tool(&definition, &tool_use.input).await,
            ToolKind::Local => definition.call(ToolInput::new(&tool_use.input)),
        };

        match outcome {
            Ok(content) => tool_result(tool_use, content, false),
            Err(e) => tool_result(tool_use, e.to_string(), true),
        }
    }

    async fn execute_delegating(
        &mut self,
        cancel: &CancellationToken,
        definition: &ToolDefinition,
        tool_use: &ToolUse,
    ) -> ToolResult {
        let response = match self
            .run_subagent(cancel, definition.description(), &tool_use.input)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = %tool_use.name, error = %e, "delegation failed");
                return tool_result(tool_use, e.to_string(), true);
            }
        };

        let response = self
            .llm
            .truncate_message(response, self.truncate_threshold);
        let mut content = String::new();
        for block in &response.content {
            match block {
                ContentBlock::Text { text } => content.push_str(text),
                ContentBlock::ToolResult(result) => content.push_str(&result.content),
                ContentBlock::ToolUse(_) => {}
            }
        }
        tool_result(tool_use, content, false)
    }

    /// Run a plan tool against the conversation's plan, then write it through.
    ///
    /// The plan is saved whether or not the tool succeeded.
    async fn execute_plan_tool(
        &mut self,
        definition: &ToolDefinition,
        input: &Value,
    ) -> ToolCallResult<String> {
        let mut plan = self.resolve_plan().await?;
        let outcome = definition.call(ToolInput::with_plan(input, &mut plan));

        self.store.save_plan(&plan).await.map_err(|e| {
            ToolError::execution(format!("failed to save plan '{}': {}", plan.id, e))
        })?;
        debug!(plan = %plan.id, steps = plan.steps.len(), "plan saved");

        self.plan = Some(plan.clone());
        self.controller.publish_detached(UiState::plan(plan));
        outcome
    }

    /// Cached plan of the conversation, fetched or created on first use.
    async fn resolve_plan(&mut self) -> ToolCallResult<Plan> {
        if let Some(plan) = &self.plan {
            if plan.conversation_id == self.conversation.id {
                return Ok(plan.clone());
            }
        }

        let conversation_id = self.conversation.id.clone();
        match self.store.get_plan(&conversation_id).await {
            Ok(plan) => Ok(plan),
            Err(e) if e.is_not_found() => {
                info!(conversation = %conversation_id, "creating plan");
                self.store.create_plan(&conversation_id).await.map_err(|e| {
                    ToolError::execution(format!(
                        "failed to create plan for conversation '{}': {}",
                        conversation_id, e
                    ))
                })
            }
            Err(e) => Err(ToolError::execution(format!(
                "failed to get plan for conversation '{}': {}",
                conversation_id, e
            ))),
        }
    }
}

fn tool_result(tool_use: &ToolUse, content: impl Into<String>, is_error: bool) -> ToolResult {
    ToolResult {
        tool_use_id: tool_use.id.clone(),
        tool_name: tool_use.name.clone(),
        content: content.into(),
        is_error,
    }
}
