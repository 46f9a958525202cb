//! Provider-agnostic LLM client contract.
//!
//! An [`LlmClient`] owns the provider-native copy of the conversation. The
//! orchestrator feeds it normalized [`Message`]s through the `to_native_*`
//! methods, then asks for inference and token counts over that native state.
//!
//! # Providers
//!
//! With the `http` feature, two adapters are available:
//!
//! - [`AnthropicClient`] for the Messages API
//! - [`GeminiClient`] for the Generative Language API
//!
//! [`build_client`] picks one from a [`ProviderKind`].

mod error;
mod history;

#[cfg(feature = "http")]
mod anthropic;
#[cfg(feature = "http")]
mod factory;
#[cfg(feature = "http")]
mod gemini;
#[cfg(feature = "http")]
mod transport;

pub use error::{LlmError, LlmResult};
pub use history::{
    HistoryCompactor, DEFAULT_SUMMARIZE_THRESHOLD, DEFAULT_TRUNCATE_THRESHOLD, TRUNCATION_MARKER,
};

#[cfg(feature = "http")]
pub use anthropic::AnthropicClient;
#[cfg(feature = "http")]
pub use factory::{
    build_client, default_model, default_subagent_model, ClientSettings, ProviderKind,
    DEFAULT_TOKEN_LIMIT,
};
#[cfg(feature = "http")]
pub use gemini::GeminiClient;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::message::Message;
use crate::tools::ToolSpec;

/// Callback receiving streamed text fragments
pub type DeltaHandler<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Separator passed to the delta handler for non-text stream events
pub const DELTA_SEPARATOR: &str = "\n";

/// Contract every LLM provider adapter implements.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider identifier, e.g. "anthropic"
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Replace the native history with a translation of `messages`.
    ///
    /// Fails with [`LlmError::EmptyHistory`] when `messages` is empty.
    fn to_native_history(&mut self, messages: &[Message]) -> LlmResult<()>;

    /// Append one message to the native history.
    ///
    /// Fails with [`LlmError::InvalidMessage`] when the role is not accepted
    /// by the provider.
    fn to_native_message(&mut self, msg: &Message) -> LlmResult<()>;

    /// Replace the native tool list. Empty input leaves it unchanged.
    fn to_native_tools(&mut self, tools: &[ToolSpec]) -> LlmResult<()>;

    /// Run one completion over the native history.
    ///
    /// When `streaming` is set, `on_delta` receives each text fragment (and
    /// [`DELTA_SEPARATOR`] for non-text deltas) before the assembled message
    /// is returned.
    async fn run_inference(
        &self,
        cancel: &CancellationToken,
        on_delta: DeltaHandler<'_>,
        streaming: bool,
    ) -> LlmResult<Message>;

    /// Provider-side token count of the native history
    async fn count_tokens(&self, cancel: &CancellationToken) -> LlmResult<usize>;

    /// Keep the anchor message plus the most recent `threshold` messages
    fn summarize_history(&self, history: &[Message], threshold: usize) -> Vec<Message>;

    /// Shorten oversized tool results in `msg`
    fn truncate_message(&self, msg: Message, threshold: usize) -> Message;
}
