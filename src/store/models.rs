//! Conversation and plan records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::message::Message;

/// An ordered dialogue between the user and the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id
    pub id: String,
    /// Messages in append order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Provider-side token count of the last completed turn
    #[serde(default)]
    pub token_count: usize,
    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation with a fresh UUID
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create an empty conversation with a known id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            token_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Append a message, stamping its sequence number and timestamp.
    ///
    /// The sequence number is the message's index in `messages`.
    pub fn append(&mut self, mut msg: Message) {
        msg.stamp(self.messages.len());
        self.messages.push(msg);
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion state of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StepStatus {
    /// Not started or in progress
    #[default]
    #[serde(rename = "TODO")]
    Todo,
    /// Finished
    #[serde(rename = "DONE")]
    Done,
}

impl StepStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Todo => "TODO",
            StepStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TODO" => Ok(StepStatus::Todo),
            "DONE" => Ok(StepStatus::Done),
            other => Err(format!("invalid step status '{}': expected TODO or DONE", other)),
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step id, unique within the plan
    pub id: String,
    /// What the step does
    pub description: String,
    /// Current status
    #[serde(default)]
    pub status: StepStatus,
    /// Conditions that mark the step done
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
}

/// The working plan attached to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan id
    pub id: String,
    /// Owning conversation
    pub conversation_id: String,
    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Create an empty plan for a conversation
    pub fn new(id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            steps: Vec::new(),
        }
    }

    /// Find a step by id
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Append a step
    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Remove the steps with the given ids, returning how many were removed
    pub fn remove_steps(&mut self, ids: &[String]) -> usize {
        let before = self.steps.len();
        self.steps.retain(|s| !ids.contains(&s.id));
        before - self.steps.len()
    }

    /// Reorder steps to match `ids`.
    ///
    /// `ids` must name every step exactly once; otherwise the plan is left
    /// untouched.
    pub fn reorder_steps(&mut self, ids: &[String]) -> Result<(), String> {
        if ids.len() != self.steps.len() {
            return Err(format!(
                "reorder requires all {} step ids, got {}",
                self.steps.len(),
                ids.len()
            ));
        }

        let positions: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        let mut seen = HashSet::with_capacity(ids.len());
        let mut order = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(format!("duplicate step id '{}' in reorder", id));
            }
            let pos = positions
                .get(id.as_str())
                .ok_or_else(|| format!("unknown step id '{}' in reorder", id))?;
            order.push(*pos);
        }

        let mut slots: Vec<Option<Step>> = std::mem::take(&mut self.steps)
            .into_iter()
            .map(Some)
            .collect();
        self.steps = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(())
    }

    /// Set the status of one step
    pub fn set_status(&mut self, id: &str, status: StepStatus) -> Result<(), String> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| format!("step '{}' not found in plan '{}'", id, self.id))?;
        step.status = status;
        Ok(())
    }

    /// Whether every step is done
    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Done)
    }
}
