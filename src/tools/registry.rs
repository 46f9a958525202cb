//! Immutable tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::{RegistryError, RegistryResult, ToolDefinition, ToolSpec};

/// Internal state shared by clones of a registry.
#[derive(Debug, Default)]
struct RegistryInner {
    /// Tools in registration order.
    tools: Vec<ToolDefinition>,

    /// Index from tool name to position in tools vector.
    name_index: HashMap<String, usize>,
}

/// Set of named, schema-described tools.
///
/// A registry is built once through [`ToolRegistryBuilder`] and never changes
/// afterwards, so clones share the same storage.
///
/// # Example
///
/// ```rust,ignore
/// use atk::tools::{fs, ToolRegistry};
///
/// let registry = ToolRegistry::builder()
///     .register(fs::read_file_tool())?
///     .register(fs::list_files_tool())?
///     .build();
///
/// assert!(registry.contains("read_file"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<RegistryInner>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a registry.
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Build a registry from a list of tools.
    pub fn from_tools(tools: impl IntoIterator<Item = ToolDefinition>) -> RegistryResult<Self> {
        let mut builder = Self::builder();
        for tool in tools {
            builder = builder.register(tool)?;
        }
        Ok(builder.build())
    }

    /// Validate a tool name.
    ///
    /// Tool names must be non-empty and contain only alphanumeric
    /// characters, underscores, or hyphens.
    pub(crate) fn validate_name(name: &str) -> RegistryResult<()> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        Ok(())
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&ToolDefinition> {
        self.inner
            .name_index
            .get(name)
            .map(|&idx| &self.inner.tools[idx])
    }

    /// Get a tool by name, returning an error if not found.
    pub fn get(&self, name: &str) -> RegistryResult<&ToolDefinition> {
        self.find(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Schemas of all tools, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.inner.tools.iter().map(|t| t.spec().clone()).collect()
    }

    /// Iterate over the tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.inner.tools.iter()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.inner.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.tools.is_empty()
    }

    /// List all tool names, in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.inner.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Check if a tool with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.name_index.contains_key(name)
    }
}

/// Collects tools for a [`ToolRegistry`].
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    inner: RegistryInner,
}

impl ToolRegistryBuilder {
    /// Add a tool.
    ///
    /// Returns an error if the name is invalid or already taken.
    pub fn register(mut self, tool: ToolDefinition) -> RegistryResult<Self> {
        ToolRegistry::validate_name(tool.name())?;

        if self.inner.name_index.contains_key(tool.name()) {
            return Err(RegistryError::Conflict(tool.name().to_string()));
        }

        let idx = self.inner.tools.len();
        self.inner.name_index.insert(tool.name().to_string(), idx);
        self.inner.tools.push(tool);
        Ok(self)
    }

    /// Freeze the collected tools.
    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            inner: Arc::new(self.inner),
        }
    }
}
