//! Gemini (Generative Language API) adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{read_events, read_json, send};
use super::{DeltaHandler, HistoryCompactor, LlmClient, LlmError, LlmResult, DELTA_SEPARATOR};
use crate::message::{ContentBlock, Message, Role, ToolUse};
use crate::tools::ToolSpec;

const PROVIDER: &str = "google";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Schema keywords the Gemini function declaration format rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: usize,
}

/// Collects text and function calls across response chunks.
#[derive(Debug, Default)]
struct ResponseAccumulator {
    text: String,
    tool_uses: Vec<ContentBlock>,
}

impl ResponseAccumulator {
    fn push_part(&mut self, part: Part) {
        if let Some(text) = part.text {
            self.text.push_str(&text);
        }
        if let Some(call) = part.function_call {
            let id = call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let input = if call.args.is_null() { json!({}) } else { call.args };
            self.tool_uses.push(ContentBlock::ToolUse(ToolUse {
                id,
                name: call.name,
                input,
                continuation: part.thought_signature,
            }));
        }
    }

    /// Apply one streamed chunk, forwarding text to `on_delta`.
    fn apply_chunk(
        &mut self,
        payload: &str,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> LlmResult<()> {
        let chunk: GenerateResponse = serde_json::from_str(payload)
            .map_err(|e| LlmError::translation(PROVIDER, format!("invalid stream chunk: {}", e)))?;

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Err(LlmError::inference(PROVIDER, "no content returned"));
        };
        let Some(content) = candidate.content else {
            if candidate.finish_reason.is_some() {
                return Ok(());
            }
            return Err(LlmError::inference(PROVIDER, "no content returned"));
        };

        for part in content.parts {
            match part.text.as_deref() {
                Some(text) if !text.is_empty() => on_delta(text),
                _ => on_delta(DELTA_SEPARATOR),
            }
            self.push_part(part);
        }
        Ok(())
    }

    fn finish(self, require_content: bool) -> LlmResult<Message> {
        let mut content = Vec::with_capacity(self.tool_uses.len() + 1);
        if !self.text.is_empty() {
            content.push(ContentBlock::text(self.text));
        }
        content.extend(self.tool_uses);

        if require_content && content.is_empty() {
            return Err(LlmError::inference(PROVIDER, "model returned no usable content"));
        }
        Ok(Message::new(Role::Model, content))
    }
}

/// [`LlmClient`] for Google's Gemini models.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
    contents: Vec<Content>,
    tools: Vec<FunctionDeclaration>,
    compactor: HistoryCompactor,
}

impl GeminiClient {
    /// Create a client for `model`
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            max_tokens,
            system_prompt: String::new(),
            contents: Vec::new(),
            tools: Vec::new(),
            compactor: HistoryCompactor::new(),
        }
    }

    /// Override the API address
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the system instruction
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    fn request(&self, method: &str, query: &str, body: &Value) -> reqwest::RequestBuilder {
        self.http_client
            .post(format!(
                "{}/models/{}:{}{}",
                self.base_url, self.model, method, query
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "contents": self.contents,
            "generationConfig": { "maxOutputTokens": self.max_tokens },
        });
        if !self.system_prompt.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": self.system_prompt }] });
        }
        if !self.tools.is_empty() {
            body["tools"] = json!([{ "functionDeclarations": self.tools }]);
        }
        body
    }
}

fn to_parts(blocks: &[ContentBlock]) -> Vec<Part> {
    let mut parts = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                if !text.is_empty() {
                    parts.push(Part {
                        text: Some(text.clone()),
                        ..Part::default()
                    });
                }
            }
            ContentBlock::ToolUse(tool_use) => parts.push(Part {
                function_call: Some(FunctionCall {
                    id: Some(tool_use.id.clone()),
                    name: tool_use.name.clone(),
                    args: tool_use.input.clone(),
                }),
                thought_signature: tool_use.continuation.clone(),
                ..Part::default()
            }),
            ContentBlock::ToolResult(result) => parts.push(Part {
                function_response: Some(FunctionResponse {
                    id: Some(result.tool_use_id.clone()),
                    name: result.tool_name.clone(),
                    response: json!({ "result": result.content }),
                }),
                ..Part::default()
            }),
        }
    }
    parts
}

/// Strip schema keywords Gemini does not accept, recursively.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), to_gemini_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
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
        self.contents = Vec::with_capacity(messages.len());
        for msg in messages {
            self.to_native_message(msg)?;
        }
        Ok(())
    }

    fn to_native_message(&mut self, msg: &Message) -> LlmResult<()> {
        let role = match msg.role {
            Role::User => "user",
            Role::Model => "model",
            Role::Assistant => {
                return Err(LlmError::invalid_message(PROVIDER, "invalid message role 'assistant'"));
            }
        };

        let parts = to_parts(&msg.content);
        if parts.is_empty() {
            return Err(LlmError::invalid_message(PROVIDER, "message has no content parts"));
        }

        self.contents.push(Content {
            role: role.to_string(),
            parts,
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
                        format!(
                            "failed to convert schema of tool '{}' to Gemini format",
                            tool.name
                        ),
                    ));
                }
                Ok(FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: to_gemini_schema(&tool.input_schema),
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
        if self.contents.is_empty() {
            return Err(LlmError::empty_history(PROVIDER));
        }
        debug!(provider = PROVIDER, model = %self.model, streaming, "running inference");

        let body = self.body();
        let on_error = |message: String| LlmError::inference(PROVIDER, message);
        let mut accumulator = ResponseAccumulator::default();

        if !streaming {
            let request = self.request("generateContent", "", &body);
            let response = send(request, cancel, on_error).await?;
            let response: GenerateResponse = read_json(response, cancel, on_error).await?;
            let content = response
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .ok_or_else(|| LlmError::inference(PROVIDER, "no content returned"))?;
            for part in content.parts {
                accumulator.push_part(part);
            }
            return accumulator.finish(false);
        }

        let response = send(
            self.request("streamGenerateContent", "?alt=sse", &body),
            cancel,
            on_error,
        )
        .await?;
        read_events(PROVIDER, response, cancel, |payload| {
            accumulator.apply_chunk(payload, &mut *on_delta)
        })
        .await?;
        accumulator.finish(true)
    }

    async fn count_tokens(&self, cancel: &CancellationToken) -> LlmResult<usize> {
        let on_error = |message: String| LlmError::TokenCount {
            provider: PROVIDER.to_string(),
            message,
        };
        let body = json!({ "contents": self.contents });
        let response = send(self.request("countTokens", "", &body), cancel, on_error).await?;
        let count: CountTokensResponse = read_json(response, cancel, on_error).await?;
        Ok(count.total_tokens)
    }

    fn summarize_history(&self, history: &[Message], threshold: usize) -> Vec<Message> {
        self.compactor.summarize_history(history, threshold)
    }

    fn truncate_message(&self, msg: Message, threshold: usize) -> Message {
        self.compactor.truncate_message(msg, threshold)
    }
}
