//! In-memory output channel
//!
//! Records every message per conversation. Used by tests and by hosts that
//! poll for replies instead of pushing them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::{OutboundMessage, OutputChannel};

/// Channel that keeps delivered messages in memory
#[derive(Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages delivered to a conversation, oldest first
    pub fn messages(&self, conversation_id: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| id == conversation_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Text of every message delivered to a conversation
    pub fn texts(&self, conversation_id: &str) -> Vec<String> {
        self.messages(conversation_id)
            .iter()
            .filter_map(|m| m.text_content().map(str::to_string))
            .collect()
    }

    /// Remove and return everything delivered to a conversation
    pub fn drain(&self, conversation_id: &str) -> Vec<OutboundMessage> {
        let mut sent = self.sent.lock();
        let (taken, kept): (Vec<_>, Vec<_>) = sent
            .drain(..)
            .partition(|(id, _)| id == conversation_id);
        *sent = kept;
        taken.into_iter().map(|(_, msg)| msg).collect()
    }

    /// Message counts per conversation
    pub fn counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (id, _) in self.sent.lock().iter() {
            *counts.entry(id.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl OutputChannel for MemoryChannel {
    async fn send(&self, conversation_id: &str, message: OutboundMessage) {
        self.sent.lock().push((conversation_id.to_string(), message));
    }
}
