//! Core traits and types for the support bot
//!
//! This crate provides foundational types used across all other crates:
//! - Boundary traits for pluggable collaborators (classifier, state store, output channel)
//! - Intent classification results
//! - Outbound message payloads (text, prompts, cards, suggested actions)
//! - Scoped state bags
//! - Error types for the external boundaries

pub mod activity;
pub mod channel;
pub mod error;
pub mod intent;
pub mod message;
pub mod state;
pub mod traits;

pub use activity::Activity;
pub use channel::MemoryChannel;
pub use error::{ClassifierError, StoreError};
pub use intent::{Entity, IntentResult, RankedIntent};
pub use message::{
    AttachmentLayout, CardAction, CardImage, HeroCard, ListStyle, OutboundMessage,
};
pub use state::{StateBag, StateScope, StateWrite};
pub use traits::{IntentClassifier, OutputChannel, StateStore};
