//! Dialog orchestration for the support bot
//!
//! Features:
//! - Immutable dialog registry with intent triggers
//! - Per-conversation dialog stack with waterfall step cursors
//! - Turn dispatcher deciding between resume, interruption and fallback
//! - Prompt engine validating choice, text and confirm answers
//!
//! # Turn flow
//!
//! ```text
//! Activity ─► TurnDispatcher ─► pending prompt? ─► validate ─► resume step
//!                    │
//!                    └─► classify ─► fallback / resume / interrupt ─► step
//!                                                                      │
//!                          OutputChannel ◄── outbox ◄── StepOutcome ◄──┘
//! ```

pub mod definition;
pub mod dispatcher;
pub mod metrics;
pub mod prompt;
pub mod registry;
pub mod runtime;
pub mod stack;
pub mod state;
pub mod step;

pub use definition::{
    DialogDefinition, InterruptDecision, InterruptHook, Interruption, SelectAction, Step,
    TriggerConfig,
};
pub use dispatcher::{DispatcherConfig, TurnDispatcher, TurnOutcome, TurnReport};
pub use prompt::{PendingPrompt, Prompt, PromptAnswer, PromptEngine, PromptKind, PromptPurpose};
pub use registry::{DialogRegistry, DialogRegistryBuilder};
pub use runtime::{DialogRuntime, RuntimeLimits};
pub use stack::{DialogInstance, DialogStack};
pub use state::ConversationState;
pub use step::{StepArgs, StepContext, StepOutcome};

use supportbot_core::StoreError;
use thiserror::Error;

/// Dialog engine errors
#[derive(Error, Debug)]
pub enum DialogError {
    #[error("Unknown dialog: {0}")]
    UnknownDialog(String),

    #[error("Dialog already registered: {0}")]
    DuplicateName(String),

    #[error("Intent '{intent}' already triggers '{existing}', cannot also trigger '{dialog}'")]
    ConflictingTrigger {
        intent: String,
        existing: String,
        dialog: String,
    },

    #[error("Dialog stack would exceed {0} instances")]
    StackOverflow(usize),

    #[error("Turn exceeded {0} step transitions")]
    RunawayTurn(usize),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid conversation state: {0}")]
    State(String),
}

impl DialogError {
    /// Errors after which the conversation is reset
    pub fn ends_conversation(&self) -> bool {
        matches!(self, Self::StackOverflow(_) | Self::RunawayTurn(_))
    }
}
