//! MCP tool proxy.
//!
//! Tools hosted by out-of-process MCP servers are registered here by name.
//! When the model calls one of them, the orchestrator forwards the call to
//! the owning [`McpServer`] instead of a local function.

mod error;

#[cfg(feature = "http")]
mod client;

pub use error::{McpError, McpResult};

#[cfg(feature = "http")]
pub use client::{load_proxy, McpHttpServer, McpServerConfig};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::tools::{RegistryError, RegistryResult, ToolSpec};

/// Handle to an external tool server.
#[async_trait]
pub trait McpServer: Send + Sync {
    /// Server name, used in diagnostics
    fn name(&self) -> &str;

    /// Run `tool` with `args` on the server.
    ///
    /// `Value::Null` means the tool produced no content.
    async fn call(
        &self,
        cancel: &CancellationToken,
        tool: &str,
        args: Map<String, Value>,
    ) -> McpResult<Value>;
}

/// A proxied tool and the server that owns it.
#[derive(Clone)]
pub struct McpToolDetails {
    /// Owning server
    pub server: Arc<dyn McpServer>,
    /// Schema advertised to the model
    pub spec: ToolSpec,
}

impl fmt::Debug for McpToolDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpToolDetails")
            .field("server", &self.server.name())
            .field("tool", &self.spec.name)
            .finish()
    }
}

/// Map from tool name to the MCP server that runs it.
#[derive(Debug, Clone, Default)]
pub struct McpProxy {
    tools: HashMap<String, McpToolDetails>,
    order: Vec<String>,
}

impl McpProxy {
    /// Create an empty proxy
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tools a server exposes.
    ///
    /// Registration is all or nothing: a name already proxied, or repeated
    /// within `specs`, fails the call and leaves the proxy unchanged.
    pub fn register_server(
        &mut self,
        server: Arc<dyn McpServer>,
        specs: Vec<ToolSpec>,
    ) -> RegistryResult<usize> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if self.tools.contains_key(&spec.name) || !seen.insert(spec.name.as_str()) {
                return Err(RegistryError::Conflict(spec.name.clone()));
            }
        }

        let count = specs.len();
        for spec in specs {
            self.order.push(spec.name.clone());
            self.tools.insert(
                spec.name.clone(),
                McpToolDetails {
                    server: Arc::clone(&server),
                    spec,
                },
            );
        }
        Ok(count)
    }

    /// Drop every proxied tool matching `predicate`, returning the removed
    /// names in registration order.
    pub fn remove_matching(&mut self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let (removed, kept): (Vec<String>, Vec<String>) =
            self.order.drain(..).partition(|name| predicate(name));
        for name in &removed {
            self.tools.remove(name);
        }
        self.order = kept;
        removed
    }

    /// Details of a proxied tool
    pub fn get(&self, name: &str) -> Option<&McpToolDetails> {
        self.tools.get(name)
    }

    /// Whether `name` is served by an MCP server
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas of every proxied tool, in registration order
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|details| details.spec.clone())
            .collect()
    }

    /// Number of proxied tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are proxied
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
