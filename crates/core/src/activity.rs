//! Inbound activity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message received from a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID
    pub id: String,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// Sender
    pub user_id: String,
    /// Raw utterance
    pub text: String,
    /// Receive time
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Create a message activity stamped with the current time
    pub fn message(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
