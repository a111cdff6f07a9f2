//! Output channel trait

use async_trait::async_trait;

use crate::OutboundMessage;

/// Delivery of outbound messages
///
/// Fire-and-forget from the engine's point of view: delivery failures are
/// the channel's concern and must be logged by the implementation.
#[async_trait]
pub trait OutputChannel: Send + Sync + 'static {
    async fn send(&self, conversation_id: &str, message: OutboundMessage);
}
