//! Agent Turn Kit (ATK) - turn orchestration for tool-calling LLM agents
//!
//! ATK drives a conversation between a user, an LLM provider, and a set of
//! tools. One call to [`agent::Agent::run`] is one turn: the model is asked,
//! every tool call it makes is answered, and the loop repeats until the model
//! replies with text only.
//!
//! - **`message`** - Provider-neutral messages and content blocks
//! - **`inference`** - The [`inference::LlmClient`] contract, history compaction, provider adapters
//! - **`tools`** - Tool definitions, the registry, and built-in tools
//! - **`mcp`** - Proxy for tools served by MCP servers
//! - **`store`** - Conversation and plan persistence
//! - **`agent`** - The turn orchestrator and subagent
//! - **`state`** - Snapshot channel for a UI
//! - **`config`** - Configuration and environment loading
//! - **`observability`** - Markdown session log
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! atk = { version = "0.3", default-features = false }
//! # Or pick surfaces:
//! atk = { version = "0.3", default-features = false, features = ["http"] }
//! # Or enable everything:
//! atk = { version = "0.3", features = ["all"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use atk::prelude::*;
//! use std::sync::Arc;
//!
//! async fn example(llm: Box<dyn LlmClient>) -> AgentResult<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let registry = atk::tools::builtin_registry().unwrap();
//!     let config = AgentConfig::new(llm, store).with_registry(registry);
//!     let mut agent = Agent::create(config).await?;
//!
//!     let cancel = CancellationToken::new();
//!     agent
//!         .run(&cancel, "list the files in src", &mut |delta: &str| print!("{delta}"))
//!         .await?;
//!     println!("tokens: {}", agent.token_count());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Conversation messages
pub mod message;

/// LLM client contract and provider adapters
pub mod inference;

/// Tool definitions and registry
pub mod tools;

/// MCP tool proxy
pub mod mcp;

/// Persistence
pub mod store;

/// Turn orchestration
pub mod agent;

/// UI snapshots
pub mod state;

/// Crate-level errors
pub mod error;

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentConfig, Subagent, TurnState};
    pub use crate::error::{AgentError, AgentResult};
    pub use crate::inference::{DeltaHandler, LlmClient, LlmError, LlmResult};
    pub use crate::mcp::{McpProxy, McpServer};
    pub use crate::message::{ContentBlock, Message, Role, ToolResult, ToolUse};
    pub use crate::state::{StateController, UiState};
    pub use crate::store::{Conversation, MemoryStore, Plan, Step, StepStatus, Store};
    pub use crate::tools::{ToolDefinition, ToolInput, ToolRegistry, ToolSpec};
    pub use tokio_util::sync::CancellationToken;

    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::Logger;

    #[cfg(feature = "http")]
    pub use crate::inference::{build_client, ClientSettings, ProviderKind};
    #[cfg(feature = "http")]
    pub use crate::store::HttpStore;
}
