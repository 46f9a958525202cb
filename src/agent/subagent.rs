//! Secondary, non-streaming agent that answers delegating tools.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Agent;
use crate::error::{AgentError, AgentResult};
use crate::inference::LlmClient;
use crate::message::{ContentBlock, Message, Role, ToolUse};
use crate::tools::finder::FinderInput;
use crate::tools::{ToolError, ToolInput, ToolKind, ToolRegistry};

/// Agent that runs a delegated query to completion with local tools only.
///
/// Each run starts a fresh native history holding just the delegated
/// request; nothing from the parent conversation is shared.
pub struct Subagent {
    llm: Box<dyn LlmClient>,
    registry: ToolRegistry,
}

impl Subagent {
    /// Build a subagent and hand its tools to the client.
    pub fn new(mut llm: Box<dyn LlmClient>, registry: ToolRegistry) -> AgentResult<Self> {
        llm.to_native_tools(&registry.specs())?;
        Ok(Self { llm, registry })
    }

    /// Model used for delegated queries
    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer `query` framed by the delegating tool's `description`.
    ///
    /// Returns the first response that carries no tool calls.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        description: &str,
        query: &str,
    ) -> AgentResult<Message> {
        let request = Message::user_text(format!("{}\n\n{}", description, query));
        self.llm
            .to_native_history(std::slice::from_ref(&request))
            .map_err(|e| {
                AgentError::Subagent(format!("failed to initialize conversation: {}", e))
            })?;

        info!(model = self.llm.model_name(), "subagent started");
        let mut silent = |_: &str| {};
        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let response = self.llm.run_inference(cancel, &mut silent, false).await?;
            let tool_uses: Vec<ToolUse> = response.tool_uses().cloned().collect();
            if tool_uses.is_empty() {
                debug!("subagent finished");
                return Ok(response);
            }
            self.llm.to_native_message(&response)?;

            let results = tool_uses.iter().map(|tu| self.execute(tu)).collect();
            self.llm
                .to_native_message(&Message::new(Role::User, results))?;
        }
    }

    fn execute(&self, tool_use: &ToolUse) -> ContentBlock {
        debug!(tool = %tool_use.name, "subagent tool call");
        let outcome = match self.registry.find(&tool_use.name) {
            Some(definition) if definition.kind() == ToolKind::Local => {
                definition.call(ToolInput::new(&tool_use.input))
            }
            Some(_) => Err(ToolError::execution(format!(
                "tool '{}' is not available to the subagent",
                tool_use.name
            ))),
            None => Err(ToolError::execution("tool not found")),
        };

        match outcome {
            Ok(content) => ContentBlock::tool_result(&tool_use.id, &tool_use.name, content, false),
            Err(e) => ContentBlock::tool_result(&tool_use.id, &tool_use.name, e.to_string(), true),
        }
    }
}

impl std::fmt::Debug for Subagent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subagent")
            .field("model", &self.llm.model_name())
            .field("tools", &self.registry.len())
            .finish()
    }
}

impl Agent {
    /// Decode a `{query}` input and hand it to the subagent.
    pub(super) async fn run_subagent(
        &mut self,
        cancel: &CancellationToken,
        description: &str,
        input: &Value,
    ) -> AgentResult<Message> {
        let input: FinderInput = serde_json::from_value(input.clone())?;
        let limit = self.delegation_timeout;
        let subagent = self
            .subagent
            .as_mut()
            .ok_or_else(|| AgentError::Subagent("no subagent configured".to_string()))?;

        let run = subagent.run(cancel, description, &input.query);
        match limit {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| AgentError::Timeout(limit))?,
            None => run.await,
        }
    }
}
