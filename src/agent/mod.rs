//! Turn orchestrator.
//!
//! An [`Agent`] drives one conversation. Each call to [`Agent::run`] is a
//! turn: the user text goes to the model, every tool the model asks for is
//! dispatched and answered in order, and the loop repeats until the model
//! replies without tool calls. The conversation is then persisted, the token
//! count refreshed, and a snapshot published.
//!
//! ```text
//! AwaitingUserInput -> ModelResponding -> ExecutingTools -> ModelResponding ... -> Done
//! ```

#[cfg(feature = "observability")]
macro_rules! session_log {
    ($agent:expr, |$logger:ident| $body:expr) => {
        if let Some($logger) = $agent.logger.as_deref() {
            if let Err(e) = $body {
                tracing::warn!(error = %e, "failed to write session log");
            }
        }
    };
}

#[cfg(not(feature = "observability"))]
macro_rules! session_log {
    ($($tokens:tt)*) => {};
}

mod dispatch;
mod subagent;

pub use subagent::Subagent;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::inference::{
    DeltaHandler, LlmClient, DEFAULT_SUMMARIZE_THRESHOLD, DEFAULT_TRUNCATE_THRESHOLD,
};
use crate::mcp::McpProxy;
use crate::message::{Message, Role, ToolUse};
#[cfg(feature = "observability")]
use crate::observability::Logger;
use crate::state::{StateController, UiState};
use crate::store::{Conversation, Plan, Store};
use crate::tools::{ToolRegistry, ToolSpec};

/// Where the orchestrator is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Waiting for the next user message
    #[default]
    AwaitingUserInput,
    /// An inference call is in flight
    ModelResponding,
    /// Tool calls from the last response are being answered
    ExecutingTools,
    /// The last turn finished with a tool-free response
    Done,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::AwaitingUserInput => "awaiting_user_input",
            TurnState::ModelResponding => "model_responding",
            TurnState::ExecutingTools => "executing_tools",
            TurnState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything an [`Agent`] is built from.
pub struct AgentConfig {
    /// Main LLM client
    pub llm: Box<dyn LlmClient>,
    /// Answers delegating tools
    pub subagent: Option<Subagent>,
    /// Local tools
    pub registry: ToolRegistry,
    /// Remote tools
    pub mcp: McpProxy,
    /// Conversation and plan persistence
    pub store: Arc<dyn Store>,
    /// Snapshot channel
    pub controller: StateController,
    /// Conversation to continue; a fresh one when `None`
    pub conversation: Option<Conversation>,
    /// Plan already loaded for the conversation
    pub plan: Option<Plan>,
    /// Stream text deltas from the main model
    pub streaming: bool,
    /// Recent messages kept when compacting history
    pub summarize_threshold: usize,
    /// Subagent output length above which tool results are truncated
    pub truncate_threshold: usize,
    /// Upper bound for MCP calls and subagent runs
    pub delegation_timeout: Option<Duration>,
    /// Markdown session log
    #[cfg(feature = "observability")]
    pub logger: Option<Arc<Logger>>,
}

impl AgentConfig {
    /// Configuration with no tools, streaming on, and default thresholds
    pub fn new(llm: Box<dyn LlmClient>, store: Arc<dyn Store>) -> Self {
        Self {
            llm,
            subagent: None,
            registry: ToolRegistry::new(),
            mcp: McpProxy::new(),
            store,
            controller: StateController::new(),
            conversation: None,
            plan: None,
            streaming: true,
            summarize_threshold: DEFAULT_SUMMARIZE_THRESHOLD,
            truncate_threshold: DEFAULT_TRUNCATE_THRESHOLD,
            delegation_timeout: None,
            #[cfg(feature = "observability")]
            logger: None,
        }
    }

    /// Set the local tools
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the remote tools
    pub fn with_mcp(mut self, mcp: McpProxy) -> Self {
        self.mcp = mcp;
        self
    }

    /// Set the subagent answering delegating tools
    pub fn with_subagent(mut self, subagent: Subagent) -> Self {
        self.subagent = Some(subagent);
        self
    }

    /// Set the snapshot channel
    pub fn with_controller(mut self, controller: StateController) -> Self {
        self.controller = controller;
        self
    }

    /// Continue an existing conversation
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = Some(conversation);
        self
    }

    /// Start from a known plan
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Enable or disable streaming
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the history compaction threshold
    pub fn with_summarize_threshold(mut self, threshold: usize) -> Self {
        self.summarize_threshold = threshold;
        self
    }

    /// Set the subagent truncation threshold
    pub fn with_truncate_threshold(mut self, threshold: usize) -> Self {
        self.truncate_threshold = threshold;
        self
    }

    /// Bound MCP calls and subagent runs
    pub fn with_delegation_timeout(mut self, timeout: Duration) -> Self {
        self.delegation_timeout = Some(timeout);
        self
    }

    /// Attach a session log
    #[cfg(feature = "observability")]
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// Orchestrator for one conversation.
pub struct Agent {
    llm: Box<dyn LlmClient>,
    subagent: Option<Subagent>,
    registry: ToolRegistry,
    mcp: McpProxy,
    store: Arc<dyn Store>,
    controller: StateController,
    conversation: Conversation,
    plan: Option<Plan>,
    token_count: usize,
    state: TurnState,
    streaming: bool,
    summarize_threshold: usize,
    truncate_threshold: usize,
    delegation_timeout: Option<Duration>,
    #[cfg(feature = "observability")]
    logger: Option<Arc<Logger>>,
}

impl Agent {
    /// Build an agent. Without a configured conversation a new local one is
    /// started; it reaches the store when the first turn completes.
    pub fn new(config: AgentConfig) -> Self {
        let conversation = config.conversation.unwrap_or_default();
        let token_count = conversation.token_count;

        let mut mcp = config.mcp;
        let registry = config.registry;
        for name in mcp.remove_matching(|name| registry.contains(name)) {
            warn!(tool = %name, "MCP tool shares a name with a local tool, skipping it");
        }

        Self {
            llm: config.llm,
            subagent: config.subagent,
            registry,
            mcp,
            store: config.store,
            controller: config.controller,
            conversation,
            plan: config.plan,
            token_count,
            state: TurnState::AwaitingUserInput,
            streaming: config.streaming,
            summarize_threshold: config.summarize_threshold,
            truncate_threshold: config.truncate_threshold,
            delegation_timeout: config.delegation_timeout,
            #[cfg(feature = "observability")]
            logger: config.logger,
        }
    }

    /// Build an agent on a conversation created by the store.
    pub async fn create(mut config: AgentConfig) -> AgentResult<Self> {
        if config.conversation.is_none() {
            config.conversation = Some(config.store.create_conversation().await?);
        }
        Ok(Self::new(config))
    }

    /// Build an agent continuing a stored conversation and its plan.
    pub async fn resume(mut config: AgentConfig, conversation_id: &str) -> AgentResult<Self> {
        let conversation = config.store.get_conversation(conversation_id).await?;
        config.plan = match config.store.get_plan(conversation_id).await {
            Ok(plan) => Some(plan),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        config.conversation = Some(conversation);
        Ok(Self::new(config))
    }

    /// Current turn state
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Token count after the last completed turn
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Plan of the conversation, once a plan tool has run or one was loaded
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// The conversation, including messages of a failed turn
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Snapshot channel this agent publishes to
    pub fn controller(&self) -> &StateController {
        &self.controller
    }

    /// Handle one user message.
    ///
    /// `on_delta` receives streamed text and one summary line per tool call.
    /// On error the in-memory conversation keeps every message appended
    /// before the failure.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        user_input: &str,
        on_delta: DeltaHandler<'_>,
    ) -> AgentResult<()> {
        info!(conversation = %self.conversation.id, "turn started");
        session_log!(self, |logger| logger.log_turn_start(&self.conversation.id, user_input));

        let result = self.run_turn(cancel, user_input, on_delta).await;
        match &result {
            Ok(()) => self.set_state(TurnState::Done),
            Err(e) => {
                self.set_state(TurnState::AwaitingUserInput);
                session_log!(self, |logger| logger.log_error(&e.to_string(), None));
            }
        }
        result
    }

    async fn run_turn(
        &mut self,
        cancel: &CancellationToken,
        user_input: &str,
        on_delta: DeltaHandler<'_>,
    ) -> AgentResult<()> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let history = self
            .llm
            .summarize_history(&self.conversation.messages, self.summarize_threshold);
        if !history.is_empty() {
            self.llm.to_native_history(&history)?;
        }
        self.llm.to_native_tools(&self.tool_specs())?;

        let user_msg = Message::user_text(user_input);
        self.llm.to_native_message(&user_msg)?;
        self.conversation.append(user_msg);

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            self.set_state(TurnState::ModelResponding);
            let response = self
                .llm
                .run_inference(cancel, &mut *on_delta, self.streaming)
                .await?;
            self.llm.to_native_message(&response)?;
            session_log!(self, |logger| logger
                .log_llm_response(&response.text(), Some(self.llm.model_name())));

            let tool_uses: Vec<ToolUse> = response.tool_uses().cloned().collect();
            self.conversation.append(response);

            if tool_uses.is_empty() {
                break;
            }

            self.set_state(TurnState::ExecutingTools);
            let mut results = Vec::with_capacity(tool_uses.len());
            for tool_use in &tool_uses {
                results.push(self.dispatch(cancel, tool_use, &mut *on_delta).await);
            }

            let result_msg = Message::new(Role::User, results);
            self.llm.to_native_message(&result_msg)?;
            self.conversation.append(result_msg);
        }

        self.complete_turn(cancel).await
    }

    /// Persist the conversation, refresh the token count, and publish it.
    async fn complete_turn(&mut self, cancel: &CancellationToken) -> AgentResult<()> {
        if !self.conversation.is_empty() {
            self.store.save_conversation(&self.conversation).await?;
            debug!(
                conversation = %self.conversation.id,
                messages = self.conversation.len(),
                "conversation saved"
            );
        }

        let count = self.llm.count_tokens(cancel).await?;
        self.token_count = count;
        self.conversation.token_count = count;
        self.store
            .update_token_count(&self.conversation.id, count)
            .await?;

        self.controller.publish_detached(UiState::token_count(count));
        info!(conversation = %self.conversation.id, token_count = count, "turn complete");
        session_log!(self, |logger| logger.log_turn_complete(&self.conversation.id, count));
        Ok(())
    }

    /// Registry tools followed by MCP tools
    fn tool_specs(&self) -> Vec<ToolSpec> {
        let mut specs = self.registry.specs();
        specs.extend(self.mcp.tool_specs());
        specs
    }

    fn set_state(&mut self, state: TurnState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "turn state");
            self.state = state;
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.llm.model_name())
            .field("conversation", &self.conversation.id)
            .field("state", &self.state)
            .field("token_count", &self.token_count)
            .finish()
    }
}
