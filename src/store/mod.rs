//! Conversation and plan persistence.
//!
//! The orchestrator only talks to storage through the [`Store`] trait.
//! [`MemoryStore`] keeps everything in process; with the `http` feature,
//! [`HttpStore`] talks to the conversation server.

mod error;
mod memory;
mod models;

#[cfg(feature = "http")]
mod http;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{Conversation, Plan, Step, StepStatus};

#[cfg(feature = "http")]
pub use http::HttpStore;

use async_trait::async_trait;

/// Persistence interface consumed by the orchestrator.
///
/// Implementations must report missing records with
/// [`StoreError::ConversationNotFound`] or [`StoreError::PlanNotFound`] so
/// callers can tell "absent" apart from other failures.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create and persist an empty conversation
    async fn create_conversation(&self) -> StoreResult<Conversation>;

    /// Load a conversation with all of its messages
    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation>;

    /// Persist a conversation, replacing any stored messages
    async fn save_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    /// Record the latest token count for a conversation
    async fn update_token_count(&self, id: &str, token_count: usize) -> StoreResult<()>;

    /// Load the plan owned by a conversation
    async fn get_plan(&self, conversation_id: &str) -> StoreResult<Plan>;

    /// Create and persist an empty plan for a conversation
    async fn create_plan(&self, conversation_id: &str) -> StoreResult<Plan>;

    /// Persist a plan
    async fn save_plan(&self, plan: &Plan) -> StoreResult<()>;
}
