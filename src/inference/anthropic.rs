//! Anthropic Messages API adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{read_events, read_json, send};
use super::{DeltaHandler, HistoryCompactor, LlmClient, LlmError, LlmResult, DELTA_SEPARATOR};
use crate::message::{ContentBlock, Message, Role};
use crate::tools::ToolSpec;

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize)]
struct NativeMessage {
    role: &'static str,
    content: Vec<NativeBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NativeBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize)]
struct NativeTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<NativeBlock>,
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockStart {
        index: usize,
        content_block: NativeBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    Error {
        error: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

/// A content block being assembled from stream events.
#[derive(Debug)]
enum PartialBlock {
    Text(String),
    ToolUse { id: String, name: String, json: String },
}

/// Assembles a streamed response into a [`Message`].
#[derive(Debug, Default)]
struct StreamAccumulator {
    blocks: Vec<(usize, PartialBlock)>,
}

impl StreamAccumulator {
    fn block_mut(&mut self, index: usize) -> Option<&mut PartialBlock> {
        self.blocks
            .iter_mut()
            .find(|(i, _)| *i == index)
            .map(|(_, block)| block)
    }

    fn apply(&mut self, payload: &str, on_delta: &mut (dyn FnMut(&str) + Send)) -> LlmResult<()> {
        let event: StreamEvent = serde_json::from_str(payload)
            .map_err(|e| LlmError::translation(PROVIDER, format!("invalid stream event: {}", e)))?;

        match event {
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                NativeBlock::Text { text } => {
                    if !text.is_empty() {
                        on_delta(&text);
                    }
                    self.blocks.push((index, PartialBlock::Text(text)));
                }
                NativeBlock::ToolUse { id, name, .. } => {
                    on_delta(DELTA_SEPARATOR);
                    self.blocks.push((
                        index,
                        PartialBlock::ToolUse {
                            id,
                            name,
                            json: String::new(),
                        },
                    ));
                }
                _ => {}
            },
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => {
                    if text.is_empty() {
                        on_delta(DELTA_SEPARATOR);
                    } else {
                        on_delta(&text);
                    }
                    match self.block_mut(index) {
                        Some(PartialBlock::Text(buf)) => buf.push_str(&text),
                        _ => self.blocks.push((index, PartialBlock::Text(text))),
                    }
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(PartialBlock::ToolUse { json, .. }) = self.block_mut(index) {
                        json.push_str(&partial_json);
                    }
                }
                BlockDelta::Other => {}
            },
            StreamEvent::Error { error } => {
                return Err(LlmError::inference(PROVIDER, format!("stream error: {}", error)));
            }
            StreamEvent::Other => {}
        }
        Ok(())
    }

    fn finish(self) -> LlmResult<Message> {
        let mut content = Vec::with_capacity(self.blocks.len());
        for (_, block) in self.blocks {
            match block {
                PartialBlock::Text(text) => content.push(ContentBlock::text(text)),
                PartialBlock::ToolUse { id, name, json } => {
                    let input = if json.trim().is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&json).map_err(|e| {
                            let message = format!("invalid tool input for {}: {}", name, e);
                            LlmError::translation(PROVIDER, message)
                        })?
                    };
                    content.push(ContentBlock::tool_use(id, name, input));
                }
            }
        }
        Ok(Message::new(Role::Assistant, content))
    }
}

/// [`LlmClient`] for Anthropic's Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
    history: Vec<NativeMessage>,
    tools: Vec<NativeTool>,
    compactor: HistoryCompactor,
}

impl AnthropicClient {
    /// Create a client for `model`
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            max_tokens,
            system_prompt: String::new(),
            history: Vec::new(),
            tools: Vec::new(),
            compactor: HistoryCompactor::new(),
        }
    }

    /// Override the API address
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    fn request(&self, path: &str, body: &Value) -> reqwest::RequestBuilder {
        self.http_client
            .post(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.history,
        });
        if !self.system_prompt.is_empty() {
            body["system"] = json!(self.system_prompt);
        }
        if !self.tools.is_empty() {
            body["tools"] = json!(self.tools);
        }
        body
    }
}

fn to_native_blocks(content: &[ContentBlock]) -> Vec<NativeBlock> {
    content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => NativeBlock::Text { text: text.clone() },
            ContentBlock::ToolUse(tool_use) => NativeBlock::ToolUse {
                id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                input: tool_use.input.clone(),
            },
            ContentBlock::ToolResult(result) => NativeBlock::ToolResult {
                tool_use_id: result.tool_use_id.clone(),
                content: result.content.clone(),
                is_error: result.is_error,
            },
        })
        .collect()
}

fn to_generic_message(response: MessagesResponse) -> Message {
    let content = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            NativeBlock::Text { text } => Some(ContentBlock::text(text)),
            NativeBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::tool_use(id, name, input))
            }
            _ => None,
        })
        .collect();
    Message::new(Role::Assistant, content)
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn to_native_history(&mut self, messages: &[Message]) -> LlmResult<()> {
        if messages.is_empty() {
            return Err(LlmError::empty_history(PROVIDER));
        }
        self.history = Vec::with_capacity(messages.len());
        for msg in messages {
            self.to_native_message(msg)?;
        }
        Ok(())
    }

    fn to_native_message(&mut self, msg: &Message) -> LlmResult<()> {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Model => {
                return Err(LlmError::invalid_message(PROVIDER, "invalid message role 'model'"));
            }
        };
        self.history.push(NativeMessage {
            role,
            content: to_native_blocks(&msg.content),
        });
        Ok(())
    }

    fn to_native_tools(&mut self, tools: &[ToolSpec]) -> LlmResult<()> {
        if tools.is_empty() {
            return Ok(());
        }
        self.tools = tools
            .iter()
            .map(|tool| {
                if !tool.input_schema.is_object() {
                    return Err(LlmError::translation(
                        PROVIDER,
                        format!("input schema of tool '{}' is not an object", tool.name),
                    ));
                }
                Ok(NativeTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.clone(),
                })
            })
            .collect::<LlmResult<_>>()?;
        Ok(())
    }

    async fn run_inference(
        &self,
        cancel: &CancellationToken,
        on_delta: DeltaHandler<'_>,
        streaming: bool,
    ) -> LlmResult<Message> {
        if self.history.is_empty() {
            return Err(LlmError::empty_history(PROVIDER));
        }

        let mut body = self.body();
        body["max_tokens"] = json!(self.max_tokens);
        body["stream"] = json!(streaming);
        debug!(provider = PROVIDER, model = %self.model, streaming, "running inference");

        let on_error = |message: String| LlmError::inference(PROVIDER, message);
        let response = send(self.request("/v1/messages", &body), cancel, on_error).await?;

        if !streaming {
            let response: MessagesResponse = read_json(response, cancel, on_error).await?;
            return Ok(to_generic_message(response));
        }

        let mut accumulator = StreamAccumulator::default();
        read_events(PROVIDER, response, cancel, |payload| {
            accumulator.apply(payload, &mut *on_delta)
        })
        .await?;
        accumulator.finish()
    }

    async fn count_tokens(&self, cancel: &CancellationToken) -> LlmResult<usize> {
        let on_error = |message: String| LlmError::TokenCount {
            provider: PROVIDER.to_string(),
            message,
        };
        let response = send(
            self.request("/v1/messages/count_tokens", &self.body()),
            cancel,
            on_error,
        )
        .await?;
        let count: CountTokensResponse = read_json(response, cancel, on_error).await?;
        Ok(count.input_tokens)
    }

    fn summarize_history(&self, history: &[Message], threshold: usize) -> Vec<Message> {
        self.compactor.summarize_history(history, threshold)
    }

    fn truncate_message(&self, msg: Message, threshold: usize) -> Message {
        self.compactor.truncate_message(msg, threshold)
    }
}
