//! Persisted conversation record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supportbot_core::StateBag;

use crate::prompt::PendingPrompt;
use crate::stack::DialogStack;
use crate::DialogError;

/// Everything the engine stores in the dialog-stack scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub stack: DialogStack,
    #[serde(default)]
    pub pending_prompt: Option<PendingPrompt>,
    #[serde(default)]
    pub turn_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(root: &str) -> Self {
        Self {
            stack: DialogStack::new(root),
            pending_prompt: None,
            turn_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Decode from a stored bag; an empty bag starts a new conversation
    pub fn from_bag(bag: StateBag, root: &str) -> Result<Self, DialogError> {
        if bag.is_empty() {
            return Ok(Self::new(root));
        }

        let mut state: Self = serde_json::from_value(bag.into_value())
            .map_err(|e| DialogError::State(format!("cannot decode dialog stack: {}", e)))?;

        if state.stack.ensure_root(root) {
            tracing::warn!(root, "Stored stack did not start with the root dialog, reset");
            state.pending_prompt = None;
        }
        Ok(state)
    }

    pub fn to_bag(&self) -> Result<StateBag, DialogError> {
        serde_json::to_value(self)
            .map(StateBag::from_value)
            .map_err(|e| DialogError::State(format!("cannot encode dialog stack: {}", e)))
    }

    /// Back to a fresh root-only stack with no prompt
    pub fn reset(&mut self) {
        self.stack.clear_to_root();
        self.pending_prompt = None;
    }

    pub fn touch(&mut self) {
        self.turn_count += 1;
        self.updated_at = Utc::now();
    }
}
