//! Tool definitions and the built-in tool set.
//!
//! A tool is a named, schema-described function. The orchestrator decides how
//! to run it from its [`ToolKind`]: local tools are called directly, delegating
//! tools are answered by the subagent, and plan tools receive the
//! conversation's [`Plan`] injected into their input.

mod error;
mod registry;

pub mod finder;
pub mod fs;
pub mod plan;
pub mod summary;

pub use error::{RegistryError, RegistryResult, ToolCallResult, ToolError};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use summary::format_tool_result_message;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::store::Plan;

/// Schema part of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON schema of the input object
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    /// Create a tool spec
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// How the orchestrator routes a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    /// Call the function with the raw input
    #[default]
    Local,
    /// Hand the call to the subagent
    Delegating,
    /// Inject the conversation plan, call, then persist the plan
    Plan,
}

/// Input handed to a tool function.
#[derive(Debug)]
pub struct ToolInput<'a> {
    /// Raw JSON arguments from the model
    pub raw_input: &'a serde_json::Value,
    /// Conversation plan, present only for [`ToolKind::Plan`] tools
    pub plan: Option<&'a mut Plan>,
}

impl<'a> ToolInput<'a> {
    /// Input without a plan
    pub fn new(raw_input: &'a serde_json::Value) -> Self {
        Self {
            raw_input,
            plan: None,
        }
    }

    /// Input carrying a plan
    pub fn with_plan(raw_input: &'a serde_json::Value, plan: &'a mut Plan) -> Self {
        Self {
            raw_input,
            plan: Some(plan),
        }
    }

    /// Decode the raw arguments into a typed input
    pub fn decode<T: DeserializeOwned>(&self) -> ToolCallResult<T> {
        Ok(serde_json::from_value(self.raw_input.clone())?)
    }

    /// Borrow the injected plan
    pub fn plan_mut(&mut self) -> ToolCallResult<&mut Plan> {
        self.plan.as_deref_mut().ok_or(ToolError::MissingPlan)
    }
}

/// Signature of an executable tool
pub type ToolFn = Arc<dyn for<'a> Fn(ToolInput<'a>) -> ToolCallResult<String> + Send + Sync>;

/// A registered tool: schema, function and routing kind.
#[derive(Clone)]
pub struct ToolDefinition {
    spec: ToolSpec,
    function: ToolFn,
    kind: ToolKind,
}

impl ToolDefinition {
    /// Create a local tool
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        function: F,
    ) -> Self
    where
        F: for<'a> Fn(ToolInput<'a>) -> ToolCallResult<String> + Send + Sync + 'static,
    {
        Self {
            spec: ToolSpec::new(name, description, input_schema),
            function: Arc::new(function),
            kind: ToolKind::Local,
        }
    }

    /// Mark the tool as answered by the subagent
    pub fn delegating(mut self) -> Self {
        self.kind = ToolKind::Delegating;
        self
    }

    /// Mark the tool as operating on the conversation plan
    pub fn plan_tool(mut self) -> Self {
        self.kind = ToolKind::Plan;
        self
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Tool description
    pub fn description(&self) -> &str {
        &self.spec.description
    }

    /// Schema advertised to the model
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Routing kind
    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Whether the subagent answers this tool
    pub fn is_delegating(&self) -> bool {
        self.kind == ToolKind::Delegating
    }

    /// Whether this tool operates on the plan
    pub fn is_plan_tool(&self) -> bool {
        self.kind == ToolKind::Plan
    }

    /// Run the tool function
    pub fn call(&self, input: ToolInput<'_>) -> ToolCallResult<String> {
        (self.function)(input)
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.spec.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Registry for the main agent: file tools, plan tools and the finder.
pub fn builtin_registry() -> RegistryResult<ToolRegistry> {
    ToolRegistry::from_tools([
        fs::read_file_tool(),
        fs::list_files_tool(),
        plan::plan_read_tool(),
        plan::plan_write_tool(),
        finder::finder_tool(),
    ])
}

/// Registry for the subagent: file tools only.
pub fn subagent_registry() -> RegistryResult<ToolRegistry> {
    ToolRegistry::from_tools([fs::read_file_tool(), fs::list_files_tool()])
}
