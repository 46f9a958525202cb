//! In-process store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Conversation, Plan, Store, StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryInner {
    conversations: HashMap<String, Conversation>,
    // keyed by conversation id
    plans: HashMap<String, Plan>,
}

/// [`Store`] backed by in-memory maps.
///
/// Cloning yields a handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means another thread panicked mid-write;
        // the maps themselves are still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored conversations
    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    /// Number of stored plans
    pub fn plan_count(&self) -> usize {
        self.lock().plans.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_conversation(&self) -> StoreResult<Conversation> {
        let conversation = Conversation::new();
        self.lock()
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation> {
        self.lock()
            .conversations
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    async fn save_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.lock()
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn update_token_count(&self, id: &str, token_count: usize) -> StoreResult<()> {
        let mut inner = self.lock();
        let conversation = inner
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
        conversation.token_count = token_count;
        Ok(())
    }

    async fn get_plan(&self, conversation_id: &str) -> StoreResult<Plan> {
        self.lock()
            .plans
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::PlanNotFound(conversation_id.to_string()))
    }

    async fn create_plan(&self, conversation_id: &str) -> StoreResult<Plan> {
        let plan = Plan::new(uuid::Uuid::new_v4().to_string(), conversation_id);
        self.lock()
            .plans
            .insert(conversation_id.to_string(), plan.clone());
        Ok(plan)
    }

    async fn save_plan(&self, plan: &Plan) -> StoreResult<()> {
        self.lock()
            .plans
            .insert(plan.conversation_id.clone(), plan.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let store = MemoryStore::new();
        let mut conv = store.create_conversation().await.unwrap();
        conv.append(Message::user_text("hi"));
        store.save_conversation(&conv).await.unwrap();
        store.update_token_count(&conv.id, 42).await.unwrap();

        let loaded = store.get_conversation(&conv.id).await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.token_count, 42);

        let err = store.get_conversation("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.update_token_count("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_plan_keyed_by_conversation() {
        let store = MemoryStore::new();
        assert!(store.get_plan("c1").await.unwrap_err().is_not_found());

        let mut plan = store.create_plan("c1").await.unwrap();
        assert_eq!(plan.conversation_id, "c1");
        plan.add_step(crate::store::Step {
            id: "s1".into(),
            description: "first".into(),
            status: Default::default(),
            acceptance_criteria: vec![],
        });
        store.save_plan(&plan).await.unwrap();

        let loaded = store.get_plan("c1").await.unwrap();
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(store.plan_count(), 1);
    }
}
