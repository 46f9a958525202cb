//! JSON-RPC client for MCP servers reachable over HTTP.
//!
//! Requests are posted to `<url>/message`. Supported methods are
//! `initialize` (followed by `notifications/initialized`), `tools/list`
//! and `tools/call`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{McpError, McpProxy, McpResult, McpServer};
use crate::tools::ToolSpec;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name/identifier
    pub name: String,
    /// Server base URL (e.g., "http://127.0.0.1:8000/pdt")
    pub url: String,
    /// Optional bearer token; `${VAR}` is resolved from the environment
    pub auth_token: Option<String>,
    /// Run the `initialize` handshake before listing tools
    pub auto_init: bool,
}

impl McpServerConfig {
    /// Create a new MCP server configuration.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            auth_token: None,
            auto_init: false,
        }
    }

    /// Set an authentication token.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Run the handshake before listing tools.
    pub fn with_auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = auto_init;
        self
    }
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// MCP tool as returned from the server
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpToolResponse {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object_schema")]
    input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Tools list response from the server
#[derive(Debug, Deserialize)]
struct ToolsListResult {
    tools: Vec<McpToolResponse>,
}

/// [`McpServer`] speaking JSON-RPC 2.0 over HTTP POST.
#[derive(Debug)]
pub struct McpHttpServer {
    name: String,
    message_url: String,
    auth_token: Option<String>,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl McpHttpServer {
    /// Create a client for the configured server.
    pub fn new(config: &McpServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            message_url: format!("{}/message", config.url.trim_end_matches('/')),
            auth_token: config.auth_token.as_deref().map(resolve_env_var),
            http_client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn post(&self, request: &JsonRpcRequest<'_>) -> McpResult<reqwest::Response> {
        let mut http_request = self.http_client.post(&self.message_url).json(request);
        if let Some(ref token) = self.auth_token {
            http_request = http_request.header("Authorization", format!("Bearer {}", token));
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| McpError::Transport(format!("{} request failed: {}", request.method, e)))?;

        if !response.status().is_success() {
            return Err(McpError::server(
                &self.name,
                format!("{} failed: HTTP {}", request.method, response.status()),
            ));
        }
        Ok(response)
    }

    /// Send a request and return its `result`.
    async fn rpc(&self, method: &str, params: Value) -> McpResult<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(self.next_id.fetch_add(1, Ordering::Relaxed)),
            method,
            params: Some(params),
        };

        let response: JsonRpcResponse = self
            .post(&request)
            .await?
            .json()
            .await
            .map_err(|e| {
                McpError::Transport(format!("failed to parse {} response: {}", method, e))
            })?;

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| {
                McpError::server(&self.name, format!("no result in {} response", method))
            })
    }

    /// Run the `initialize` handshake.
    pub async fn initialize(&self) -> McpResult<()> {
        self.rpc(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "atk-mcp-client",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
        .await?;

        let notification = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: None,
        };
        self.post(&notification).await?;
        Ok(())
    }

    /// Fetch the tools the server exposes.
    pub async fn list_tools(&self) -> McpResult<Vec<ToolSpec>> {
        let result = self.rpc("tools/list", json!({})).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| {
                McpError::server(&self.name, format!("failed to parse tools list: {}", e))
            })?;

        Ok(list
            .tools
            .into_iter()
            .map(|t| ToolSpec::new(t.name, t.description, t.input_schema))
            .collect())
    }
}

#[async_trait]
impl McpServer for McpHttpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        tool: &str,
        args: Map<String, Value>,
    ) -> McpResult<Value> {
        debug!(server = %self.name, tool, "calling MCP tool");
        let params = json!({ "name": tool, "arguments": args });

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(McpError::Cancelled),
            result = self.rpc("tools/call", params) => result?,
        };

        let text = text_content(&result);
        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(McpError::server(&self.name, text));
        }

        if text.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::String(text))
        }
    }
}

/// Join the text items of an MCP `content` array.
fn text_content(result: &Value) -> String {
    match result.get("content") {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Resolve environment variable references in a string.
///
/// Supports patterns like `${VAR_NAME}` and replaces them with
/// the corresponding environment variable value.
fn resolve_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Connect to every configured server and register its tools.
///
/// Servers that fail to answer are skipped with a warning.
pub async fn load_proxy(servers: &[McpServerConfig]) -> McpProxy {
    let mut proxy = McpProxy::new();

    for config in servers {
        let server = McpHttpServer::new(config);
        if config.auto_init {
            if let Err(e) = server.initialize().await {
                warn!(server = %config.name, error = %e, "MCP initialize failed, continuing");
            }
        }

        let specs = match server.list_tools().await {
            Ok(specs) => specs,
            Err(e) => {
                warn!(server = %config.name, error = %e, "failed to fetch tools from MCP server");
                continue;
            }
        };

        match proxy.register_server(Arc::new(server), specs) {
            Ok(count) => info!(server = %config.name, count, "loaded MCP tools"),
            Err(e) => warn!(server = %config.name, error = %e, "failed to register MCP tools"),
        }
    }

    proxy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let config = McpServerConfig::new("test-server", "http://localhost:8000/")
            .with_auth("secret-token")
            .with_auto_init(true);
        assert_eq!(config.auth_token.as_deref(), Some("secret-token"));
        assert!(config.auto_init);

        let server = McpHttpServer::new(&config);
        assert_eq!(server.message_url, "http://localhost:8000/message");
        assert_eq!(server.name(), "test-server");
    }

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(1),
            method: "tools/list",
            params: Some(json!({})),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));

        let notification = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: None,
        };
        let json = serde_json::to_string(&notification).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_text_content_extraction() {
        let result = json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "line two"}
            ]
        });
        assert_eq!(text_content(&result), "line one\nline two");
        assert_eq!(text_content(&json!({})), "");
    }

    #[test]
    fn test_tools_list_parsing() {
        let result = json!({
            "tools": [
                {"name": "forecast", "description": "Weather", "inputSchema": {"type": "object"}},
                {"name": "ping"}
            ]
        });
        let list: ToolsListResult = serde_json::from_value(result).unwrap();
        assert_eq!(list.tools.len(), 2);
        assert_eq!(list.tools[1].input_schema["type"], "object");
    }

    #[test]
    fn test_resolve_env_var() {
        std::env::set_var("ATK_TEST_MCP_VAR", "test_value");

        assert_eq!(resolve_env_var("${ATK_TEST_MCP_VAR}"), "test_value");
        assert_eq!(resolve_env_var("plain_value"), "plain_value");
        assert_eq!(resolve_env_var("${ATK_NONEXISTENT_VAR}"), "${ATK_NONEXISTENT_VAR}");

        std::env::remove_var("ATK_TEST_MCP_VAR");
    }

    #[tokio::test]
    async fn test_unreachable_servers_are_skipped() {
        let proxy = load_proxy(&[McpServerConfig::new("down", "http://127.0.0.1:9")]).await;
        assert!(proxy.is_empty());
    }
}
