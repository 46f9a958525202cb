//! Hand-written collaborators for driving the orchestrator in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use atk::inference::{DeltaHandler, HistoryCompactor, LlmClient, LlmError, LlmResult};
use atk::mcp::{McpError, McpResult, McpServer};
use atk::message::{ContentBlock, Message, Role};
use atk::store::{Conversation, MemoryStore, Plan, Store, StoreError, StoreResult};
use atk::tools::ToolSpec;

/// What a scripted client saw.
#[derive(Debug, Default)]
pub struct LlmRecord {
    /// Native history as rebuilt and appended to
    pub native: Vec<Message>,
    /// Every `to_native_history` input
    pub history_calls: Vec<Vec<Message>>,
    /// Last tool list
    pub tools: Vec<ToolSpec>,
    /// Streaming flag of each inference call
    pub streaming: Vec<bool>,
}

/// LLM client answering from a fixed script.
pub struct ScriptedLlm {
    model: String,
    script: Mutex<VecDeque<LlmResult<Message>>>,
    tokens: usize,
    token_error: bool,
    accept_limit: Option<usize>,
    pub record: Arc<Mutex<LlmRecord>>,
    compactor: HistoryCompactor,
}

impl ScriptedLlm {
    pub fn new(script: Vec<LlmResult<Message>>) -> Self {
        Self {
            model: "scripted-model".to_string(),
            script: Mutex::new(script.into()),
            tokens: 42,
            token_error: false,
            accept_limit: None,
            record: Arc::new(Mutex::new(LlmRecord::default())),
            compactor: HistoryCompactor::new(),
        }
    }

    pub fn replying(script: Vec<Message>) -> Self {
        Self::new(script.into_iter().map(Ok).collect())
    }

    pub fn with_tokens(mut self, tokens: usize) -> Self {
        self.tokens = tokens;
        self
    }

    /// Make `count_tokens` fail
    pub fn failing_token_count(mut self) -> Self {
        self.token_error = true;
        self
    }

    /// Reject every `to_native_message` after the first `accepted`
    pub fn rejecting_messages_after(mut self, accepted: usize) -> Self {
        self.accept_limit = Some(accepted);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn to_native_history(&mut self, messages: &[Message]) -> LlmResult<()> {
        if messages.is_empty() {
            return Err(LlmError::empty_history("scripted"));
        }
        let mut record = self.record.lock().unwrap();
        record.history_calls.push(messages.to_vec());
        record.native = messages.to_vec();
        Ok(())
    }

    fn to_native_message(&mut self, msg: &Message) -> LlmResult<()> {
        if let Some(limit) = self.accept_limit {
            if limit == 0 {
                return Err(LlmError::translation("scripted", "unsupported content block"));
            }
            self.accept_limit = Some(limit - 1);
        }
        self.record.lock().unwrap().native.push(msg.clone());
        Ok(())
    }

    fn to_native_tools(&mut self, tools: &[ToolSpec]) -> LlmResult<()> {
        if !tools.is_empty() {
            self.record.lock().unwrap().tools = tools.to_vec();
        }
        Ok(())
    }

    async fn run_inference(
        &self,
        _cancel: &CancellationToken,
        on_delta: DeltaHandler<'_>,
        streaming: bool,
    ) -> LlmResult<Message> {
        self.record.lock().unwrap().streaming.push(streaming);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::inference("scripted", "script exhausted")));

        if let Ok(msg) = &next {
            if streaming {
                for block in &msg.content {
                    if let Some(text) = block.as_text() {
                        on_delta(text);
                    }
                }
            }
        }
        next
    }

    async fn count_tokens(&self, _cancel: &CancellationToken) -> LlmResult<usize> {
        if self.token_error {
            return Err(LlmError::TokenCount {
                provider: "scripted".to_string(),
                message: "count endpoint unavailable".to_string(),
            });
        }
        Ok(self.tokens)
    }

    fn summarize_history(&self, history: &[Message], threshold: usize) -> Vec<Message> {
        self.compactor.summarize_history(history, threshold)
    }

    fn truncate_message(&self, msg: Message, threshold: usize) -> Message {
        self.compactor.truncate_message(msg, threshold)
    }
}

/// Client whose history translation always fails.
pub struct BrokenHistoryLlm;

#[async_trait]
impl LlmClient for BrokenHistoryLlm {
    fn provider_name(&self) -> &str {
        "broken"
    }

    fn model_name(&self) -> &str {
        "broken-model"
    }

    fn to_native_history(&mut self, _messages: &[Message]) -> LlmResult<()> {
        Err(LlmError::translation("broken", "unsupported block"))
    }

    fn to_native_message(&mut self, _msg: &Message) -> LlmResult<()> {
        Ok(())
    }

    fn to_native_tools(&mut self, _tools: &[ToolSpec]) -> LlmResult<()> {
        Ok(())
    }

    async fn run_inference(
        &self,
        _cancel: &CancellationToken,
        _on_delta: DeltaHandler<'_>,
        _streaming: bool,
    ) -> LlmResult<Message> {
        Err(LlmError::inference("broken", "unreachable"))
    }

    async fn count_tokens(&self, _cancel: &CancellationToken) -> LlmResult<usize> {
        Ok(0)
    }

    fn summarize_history(&self, history: &[Message], _threshold: usize) -> Vec<Message> {
        history.to_vec()
    }

    fn truncate_message(&self, msg: Message, _threshold: usize) -> Message {
        msg
    }
}

/// Store that records every call before delegating to a [`MemoryStore`].
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub events: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Calls that wrote something
    pub fn writes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| !e.starts_with("get_"))
            .collect()
    }

    /// Make every later call to `operation` fail after being recorded
    pub fn fail_on(&self, operation: &str) {
        self.failing.lock().unwrap().push(operation.to_string());
    }

    fn push(&self, event: impl Into<String>) -> StoreResult<()> {
        let event = event.into();
        let operation = event.split(':').next().unwrap_or_default().to_string();
        self.events.lock().unwrap().push(event);
        if self.failing.lock().unwrap().contains(&operation) {
            return Err(StoreError::Transport(format!("{} refused", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn create_conversation(&self) -> StoreResult<Conversation> {
        self.push("create_conversation")?;
        self.inner.create_conversation().await
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation> {
        self.push("get_conversation")?;
        self.inner.get_conversation(id).await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.push("save_conversation")?;
        self.inner.save_conversation(conversation).await
    }

    async fn update_token_count(&self, id: &str, token_count: usize) -> StoreResult<()> {
        self.push(format!("update_token_count:{}", token_count))?;
        self.inner.update_token_count(id, token_count).await
    }

    async fn get_plan(&self, conversation_id: &str) -> StoreResult<Plan> {
        self.push("get_plan")?;
        self.inner.get_plan(conversation_id).await
    }

    async fn create_plan(&self, conversation_id: &str) -> StoreResult<Plan> {
        self.push("create_plan")?;
        self.inner.create_plan(conversation_id).await
    }

    async fn save_plan(&self, plan: &Plan) -> StoreResult<()> {
        self.push("save_plan")?;
        self.inner.save_plan(plan).await
    }
}

/// Canned MCP outcome
pub enum McpReply {
    Value(Value),
    Fail(String),
    Hang,
}

/// MCP server answering from a table and recording calls.
pub struct MockMcpServer {
    name: String,
    replies: HashMap<String, McpReply>,
    pub calls: Arc<Mutex<Vec<(String, Map<String, Value>)>>>,
}

impl MockMcpServer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reply(mut self, tool: &str, reply: McpReply) -> Self {
        self.replies.insert(tool.to_string(), reply);
        self
    }
}

#[async_trait]
impl McpServer for MockMcpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        tool: &str,
        args: Map<String, Value>,
    ) -> McpResult<Value> {
        self.calls.lock().unwrap().push((tool.to_string(), args));
        match self.replies.get(tool) {
            Some(McpReply::Value(value)) => Ok(value.clone()),
            Some(McpReply::Fail(message)) => Err(McpError::server(&self.name, message.clone())),
            Some(McpReply::Hang) => {
                cancel.cancelled().await;
                Err(McpError::Cancelled)
            }
            None => Ok(Value::Null),
        }
    }
}

pub fn assistant_text(text: &str) -> Message {
    Message::new(Role::Assistant, vec![ContentBlock::text(text)])
}

pub fn assistant_tool_uses(calls: &[(&str, &str, Value)]) -> Message {
    let blocks = calls
        .iter()
        .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
        .collect();
    Message::new(Role::Assistant, blocks)
}

pub fn simple_spec(name: &str) -> ToolSpec {
    ToolSpec::new(name, format!("{} tool", name), serde_json::json!({"type": "object"}))
}
