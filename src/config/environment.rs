//! Environment variable loading and management.
//!
//! Provider API keys and the provider override come from the process
//! environment, optionally seeded from a `.env` file.

use std::env;
use std::path::Path;
use tracing::warn;

#[cfg(feature = "http")]
use crate::inference::ProviderKind;

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to .env file. Nothing is loaded when None.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only an explicit path is loaded so tests never pick up a stray .env
        if let Some(path) = env_file.filter(|p| p.exists()) {
            if let Err(e) = dotenv::from_path(path) {
                warn!(path = %path.display(), error = %e, "failed to load .env file");
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// Path of the loaded .env file, if one was given
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Provider override from `LLM_PROVIDER`.
    pub fn llm_provider(&self) -> Option<String> {
        non_empty("LLM_PROVIDER")
    }

    /// `ANTHROPIC_API_KEY`
    pub fn anthropic_api_key(&self) -> Option<String> {
        non_empty("ANTHROPIC_API_KEY")
    }

    /// `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`
    pub fn google_api_key(&self) -> Option<String> {
        non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY"))
    }

    /// API key for `provider`
    #[cfg(feature = "http")]
    pub fn api_key(&self, provider: ProviderKind) -> Option<String> {
        match provider {
            ProviderKind::Anthropic => self.anthropic_api_key(),
            ProviderKind::Google => self.google_api_key(),
        }
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_llm_provider_selection() {
        env::remove_var("LLM_PROVIDER");
        let env_loader = EnvironmentLoader::default();
        assert_eq!(env_loader.llm_provider(), None);

        env::set_var("LLM_PROVIDER", "google");
        let env_loader = EnvironmentLoader::default();
        assert_eq!(env_loader.llm_provider(), Some("google".to_string()));

        env::remove_var("LLM_PROVIDER");
    }

    #[test]
    fn test_google_key_fallback() {
        env::remove_var("GOOGLE_API_KEY");
        env::set_var("GEMINI_API_KEY", "gemini-key");
        let env_loader = EnvironmentLoader::default();
        assert_eq!(env_loader.google_api_key(), Some("gemini-key".to_string()));

        env::set_var("GOOGLE_API_KEY", "google-key");
        assert_eq!(env_loader.google_api_key(), Some("google-key".to_string()));

        env::remove_var("GOOGLE_API_KEY");
        env::remove_var("GEMINI_API_KEY");
    }

    #[test]
    fn test_env_file_loading() {
        let env_loader = EnvironmentLoader::new(None);
        assert!(env_loader.env_file().is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "ATK_TEST_ENV_FILE_KEY=from-file\n").unwrap();

        let env_loader = EnvironmentLoader::new(Some(path.as_path()));
        assert!(env_loader.env_file().is_some());
        assert_eq!(env::var("ATK_TEST_ENV_FILE_KEY").unwrap(), "from-file");
        env::remove_var("ATK_TEST_ENV_FILE_KEY");
    }
}
