//! TOML configuration parsing and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::inference::{DEFAULT_SUMMARIZE_THRESHOLD, DEFAULT_TRUNCATE_THRESHOLD};

#[cfg(feature = "http")]
use super::environment::EnvironmentLoader;
#[cfg(feature = "http")]
use crate::inference::{default_model, default_subagent_model, ClientSettings, ProviderKind};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/atk.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub llm: LlmConfig,
    pub subagent: SubagentConfig,
    pub history: HistoryConfig,
    pub store: StoreConfig,
    pub mcp: McpConfig,
    pub logging: LoggingConfig,
}

/// Main model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "anthropic" or "google"
    pub provider: String,
    /// Model name; the provider default when unset
    pub model: Option<String>,
    pub max_tokens: u32,
    pub streaming: bool,
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            max_tokens: 8192,
            streaming: true,
            system_prompt: None,
        }
    }
}

/// Subagent model configuration.
///
/// Provider falls back to the main provider when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubagentConfig {
    pub enabled: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: u32,
}

impl Default for SubagentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: None,
            model: None,
            max_tokens: 8192,
        }
    }
}

/// History compaction thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub summarize_threshold: usize,
    pub truncate_threshold: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            summarize_threshold: DEFAULT_SUMMARIZE_THRESHOLD,
            truncate_threshold: DEFAULT_TRUNCATE_THRESHOLD,
        }
    }
}

/// Conversation server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11436".to_string(),
        }
    }
}

/// MCP (Model Context Protocol) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Enable MCP tool discovery
    #[serde(default)]
    pub enabled: bool,
    /// Bound for MCP calls and subagent runs (seconds, 0 for none)
    #[serde(default = "default_mcp_timeout")]
    pub timeout_seconds: u64,
    /// List of MCP servers to connect to
    #[serde(default)]
    pub servers: Vec<McpServerEntry>,
}

fn default_mcp_timeout() -> u64 {
    30
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: default_mcp_timeout(),
            servers: vec![],
        }
    }
}

/// Configuration for a single MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    /// Server identifier used in logs
    pub name: String,
    /// Server URL
    pub url: String,
    /// Optional bearer token (supports `${VAR}` substitution)
    pub auth_token: Option<String>,
    /// Send initialize/initialized before listing tools
    #[serde(default = "default_auto_init")]
    pub auto_init: bool,
}

fn default_auto_init() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Session log path; a temp file when unset
    pub log_file: Option<String>,
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: "INFO".to_string(),
        }
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    pub config_path: PathBuf,
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses `config/atk.toml`.
    ///   A missing file yields the built-in defaults.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Configuration::default()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Timeout for delegated calls, `None` when `timeout_seconds` is 0.
    pub fn delegation_timeout(&self) -> Option<Duration> {
        match self.config.mcp.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Main provider, `LLM_PROVIDER` taking precedence over the file.
    #[cfg(feature = "http")]
    pub fn provider(&self, env: &EnvironmentLoader) -> Result<ProviderKind> {
        env.llm_provider()
            .unwrap_or_else(|| self.config.llm.provider.clone())
            .parse()
    }

    /// Settings for the main LLM client.
    #[cfg(feature = "http")]
    pub fn client_settings(&self, env: &EnvironmentLoader) -> Result<ClientSettings> {
        let provider = self.provider(env)?;
        let llm = &self.config.llm;
        let mut settings = ClientSettings::new(provider, env.api_key(provider).unwrap_or_default());
        settings.model = llm
            .model
            .clone()
            .unwrap_or_else(|| default_model(provider).to_string());
        settings.max_tokens = llm.max_tokens;
        if let Some(prompt) = &llm.system_prompt {
            settings.system_prompt = prompt.clone();
        }
        Ok(settings)
    }

    /// Settings for the subagent client, `None` when disabled.
    #[cfg(feature = "http")]
    pub fn subagent_settings(&self, env: &EnvironmentLoader) -> Result<Option<ClientSettings>> {
        let sub = &self.config.subagent;
        if !sub.enabled {
            return Ok(None);
        }

        let provider = match &sub.provider {
            Some(name) => name.parse()?,
            None => self.provider(env)?,
        };
        let mut settings = ClientSettings::new(provider, env.api_key(provider).unwrap_or_default());
        settings.model = sub
            .model
            .clone()
            .unwrap_or_else(|| default_subagent_model(provider).to_string());
        settings.max_tokens = sub.max_tokens;
        Ok(Some(settings))
    }

    /// MCP servers to connect to; empty when MCP is disabled.
    #[cfg(feature = "http")]
    pub fn mcp_servers(&self) -> Vec<crate::mcp::McpServerConfig> {
        if !self.config.mcp.enabled {
            return Vec::new();
        }

        self.config
            .mcp
            .servers
            .iter()
            .map(|entry| {
                let server = crate::mcp::McpServerConfig::new(&entry.name, &entry.url)
                    .with_auto_init(entry.auto_init);
                match &entry.auth_token {
                    Some(token) => server.with_auth(token),
                    None => server,
                }
            })
            .collect()
    }
}
