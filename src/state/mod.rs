//! Snapshot channel between the orchestrator and a presentation layer.
//!
//! The orchestrator publishes plan and token-count snapshots; one long-lived
//! consumer takes the receiving end through [`StateController::subscribe`].

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::store::Plan;

/// Capacity of the snapshot channel
pub const CHANNEL_CAPACITY: usize = 10;

/// One published snapshot. Fields left `None` did not change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    /// Latest plan
    pub plan: Option<Plan>,
    /// Latest token count
    pub token_count: Option<usize>,
}

impl UiState {
    /// Snapshot carrying a plan
    pub fn plan(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            token_count: None,
        }
    }

    /// Snapshot carrying a token count
    pub fn token_count(token_count: usize) -> Self {
        Self {
            plan: None,
            token_count: Some(token_count),
        }
    }
}

/// Bounded single-consumer channel of [`UiState`] snapshots.
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct StateController {
    sender: mpsc::Sender<UiState>,
    receiver: Arc<Mutex<Option<mpsc::Receiver<UiState>>>>,
}

impl StateController {
    /// Create a controller with a channel of [`CHANNEL_CAPACITY`]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
        }
    }

    /// Send a snapshot, waiting while the channel is full.
    ///
    /// Snapshots published after the subscriber dropped are discarded.
    pub async fn publish(&self, state: UiState) {
        if self.sender.send(state).await.is_err() {
            debug!("state subscriber gone, snapshot dropped");
        }
    }

    /// Publish from a detached task so the caller never waits.
    ///
    /// Must be called from within a tokio runtime.
    pub fn publish_detached(&self, state: UiState) {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.publish(state).await;
        });
    }

    /// Take the receiving end. Only the first call gets it.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<UiState>> {
        self.receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Default for StateController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let controller = StateController::new();
        let mut rx = controller.subscribe().unwrap();
        assert!(controller.subscribe().is_none());

        controller.publish(UiState::token_count(42)).await;
        controller.publish(UiState::plan(Plan::new("p", "c"))).await;

        assert_eq!(rx.recv().await.unwrap().token_count, Some(42));
        assert_eq!(rx.recv().await.unwrap().plan.unwrap().id, "p");
    }

    #[tokio::test]
    async fn test_publish_blocks_when_full() {
        let controller = StateController::new();
        let mut rx = controller.subscribe().unwrap();
        for i in 0..CHANNEL_CAPACITY {
            controller.publish(UiState::token_count(i)).await;
        }

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            controller.publish(UiState::token_count(99)),
        )
        .await;
        assert!(blocked.is_err());

        rx.recv().await.unwrap();
        controller.publish(UiState::token_count(100)).await;
    }

    #[tokio::test]
    async fn test_detached_publish_does_not_wait() {
        let controller = StateController::new();
        for i in 0..CHANNEL_CAPACITY + 5 {
            controller.publish_detached(UiState::token_count(i));
        }

        let mut rx = controller.subscribe().unwrap();
        let mut received = 0;
        while received < CHANNEL_CAPACITY + 5 {
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received += 1;
        }
        assert_eq!(received, CHANNEL_CAPACITY + 5);
    }

    #[tokio::test]
    async fn test_publish_after_subscriber_dropped() {
        let controller = StateController::new();
        drop(controller.subscribe());
        controller.publish(UiState::token_count(1)).await;
    }
}
