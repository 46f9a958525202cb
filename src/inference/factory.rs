//! Provider factory for creating LLM clients from settings.

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::{AnthropicClient, GeminiClient, LlmClient};

/// Default output token limit
pub const DEFAULT_TOKEN_LIMIT: u32 = 8192;

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// Google Gemini API
    Google,
}

impl ProviderKind {
    /// Provider identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
        }
    }

    /// Models known to work with this provider
    pub fn available_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Anthropic => &[
                "claude-opus-4-0",
                "claude-sonnet-4-0",
                "claude-3-5-sonnet-latest",
                "claude-3-5-haiku-latest",
                "claude-3-opus-latest",
                "claude-3-haiku-20240307",
            ],
            ProviderKind::Google => &[
                "gemini-2.5-pro",
                "gemini-2.5-flash",
                "gemini-2.0-flash",
                "gemini-2.0-flash-lite",
                "gemini-1.5-pro",
                "gemini-1.5-flash",
            ],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            other => bail!("unknown model provider: {}", other),
        }
    }
}

/// Default main model for a provider
pub fn default_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Anthropic => "claude-sonnet-4-0",
        ProviderKind::Google => "gemini-2.5-pro",
    }
}

/// Default subagent model for a provider
pub fn default_subagent_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Anthropic => "claude-3-5-haiku-latest",
        ProviderKind::Google => "gemini-2.5-flash",
    }
}

/// Everything needed to construct a client
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Which provider to talk to
    pub provider: ProviderKind,
    /// Model name; the provider default when empty
    pub model: String,
    /// Output token limit
    pub max_tokens: u32,
    /// API key
    pub api_key: String,
    /// System prompt sent with every request
    pub system_prompt: String,
    /// API address override
    pub base_url: Option<String>,
}

impl ClientSettings {
    /// Settings with the provider's default model and token limit
    pub fn new(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: default_model(provider).to_string(),
            max_tokens: DEFAULT_TOKEN_LIMIT,
            api_key: api_key.into(),
            system_prompt: String::new(),
            base_url: None,
        }
    }
}

/// Create a client from settings.
///
/// Fails when no API key is configured.
pub fn build_client(settings: &ClientSettings) -> Result<Box<dyn LlmClient>> {
    if settings.api_key.is_empty() {
        bail!("no API key configured for provider '{}'", settings.provider);
    }

    let model = if settings.model.is_empty() {
        default_model(settings.provider)
    } else {
        settings.model.as_str()
    };
    let max_tokens = if settings.max_tokens == 0 {
        DEFAULT_TOKEN_LIMIT
    } else {
        settings.max_tokens
    };
    debug!(provider = %settings.provider, model, max_tokens, "building LLM client");

    let client: Box<dyn LlmClient> = match settings.provider {
        ProviderKind::Anthropic => {
            let mut client = AnthropicClient::new(&settings.api_key, model, max_tokens)
                .with_system_prompt(&settings.system_prompt);
            if let Some(base_url) = &settings.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client)
        }
        ProviderKind::Google => {
            let mut client = GeminiClient::new(&settings.api_key, model, max_tokens)
                .with_system_prompt(&settings.system_prompt);
            if let Some(base_url) = &settings.base_url {
                client = client.with_base_url(base_url);
            }
            Box::new(client)
        }
    };
    Ok(client)
}
