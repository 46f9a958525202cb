//! Configuration management for the agent.
//!
//! This module provides configuration loading through TOML files and
//! environment variable management via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use atk::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! // Load environment variables
//! let env = EnvironmentLoader::new(Some(Path::new(".env")));
//!
//! // Load configuration from TOML
//! let config_loader = ConfigurationLoader::new(Some(Path::new("config/atk.toml"))).unwrap();
//! let config = &config_loader.config;
//!
//! println!("Summarize threshold: {}", config.history.summarize_threshold);
//! println!("LLM provider: {:?}", env.llm_provider());
//! ```

pub mod config;
pub mod environment;

pub use self::config::{
    Configuration, ConfigurationLoader, HistoryConfig, LlmConfig, LoggingConfig, McpConfig,
    McpServerEntry, StoreConfig, SubagentConfig, DEFAULT_CONFIG_PATH,
};
pub use self::environment::EnvironmentLoader;
