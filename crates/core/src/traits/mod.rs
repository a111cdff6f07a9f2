//! Core traits for the support bot
//!
//! Every external collaborator of the dialog engine sits behind one of these
//! traits so that:
//! - Backends can be swapped without touching dialog code
//! - Tests can run against in-memory mocks
//! - The backend is chosen at runtime from configuration
//!
//! # Trait Hierarchy
//!
//! ```text
//! Understanding:
//!   - IntentClassifier: utterance → ranked intents + entities
//!
//! State:
//!   - StateStore: get/set/delete scoped state bags
//!
//! Output:
//!   - OutputChannel: deliver structured messages to a conversation
//! ```

mod channel;
mod classifier;
mod store;

pub use channel::OutputChannel;
pub use classifier::IntentClassifier;
pub use store::StateStore;
