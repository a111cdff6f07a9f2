//! Dialog definitions
//!
//! A [`DialogDefinition`] is a named, ordered list of steps plus an optional
//! intent trigger. Definitions are built once at startup and never change.
//!
//! ```ignore
//! let webinar = DialogDefinition::new("BookWebinarDialog")
//!     .step(show_webinars)
//!     .step(pick_time)
//!     .trigger(
//!         TriggerConfig::new("BookWebinar")
//!             .confirm_prompt("Do you want to cancel the current task and talk about it?"),
//!     );
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use supportbot_core::RankedIntent;

use crate::step::{StepArgs, StepContext, StepOutcome};

/// A single step of a dialog
pub type Step = Arc<dyn Fn(&mut StepContext<'_>, StepArgs) -> StepOutcome + Send + Sync>;

/// Hook consulted when another dialog's trigger fires while this one is on top
pub type InterruptHook =
    Arc<dyn Fn(&mut StepContext<'_>, &Interruption) -> InterruptDecision + Send + Sync>;

/// An interruption being considered for the top dialog
#[derive(Debug, Clone, PartialEq)]
pub struct Interruption {
    /// Dialog whose trigger matched
    pub target: String,
    /// Intent that matched it
    pub intent: RankedIntent,
}

/// Answer of an interruption hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptDecision {
    /// Keep the current dialog and hand it the utterance
    Suppress,
    /// Let the matched dialog begin
    Allow,
}

/// How a triggered dialog enters the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectAction {
    /// Push on top of whatever is running
    #[default]
    Nest,
    /// Unwind to the root, then begin
    ClearStack,
}

/// Intent trigger and interruption behaviour of a dialog
#[derive(Clone)]
pub struct TriggerConfig {
    /// Intent that begins this dialog; `None` for dialogs only begun by others
    pub intent: Option<String>,
    /// Minimum score for this trigger, on top of the global floor
    pub min_confidence: f32,
    pub on_interrupted: Option<InterruptHook>,
    /// Asked before this dialog is interrupted when no hook is set
    pub confirm_prompt: Option<String>,
    pub select_action: SelectAction,
}

impl TriggerConfig {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: Some(intent.into()),
            ..Self::interruption_only()
        }
    }

    /// No intent; carries only the interruption settings
    pub fn interruption_only() -> Self {
        Self {
            intent: None,
            min_confidence: 0.0,
            on_interrupted: None,
            confirm_prompt: None,
            select_action: SelectAction::Nest,
        }
    }

    pub fn min_confidence(mut self, score: f32) -> Self {
        self.min_confidence = score;
        self
    }

    pub fn on_interrupted<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut StepContext<'_>, &Interruption) -> InterruptDecision + Send + Sync + 'static,
    {
        self.on_interrupted = Some(Arc::new(hook));
        self
    }

    pub fn confirm_prompt(mut self, text: impl Into<String>) -> Self {
        self.confirm_prompt = Some(text.into());
        self
    }

    pub fn clear_stack(mut self) -> Self {
        self.select_action = SelectAction::ClearStack;
        self
    }
}

impl fmt::Debug for TriggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerConfig")
            .field("intent", &self.intent)
            .field("min_confidence", &self.min_confidence)
            .field("on_interrupted", &self.on_interrupted.is_some())
            .field("confirm_prompt", &self.confirm_prompt)
            .field("select_action", &self.select_action)
            .finish()
    }
}

/// Named sequence of steps
#[derive(Clone)]
pub struct DialogDefinition {
    name: String,
    steps: Vec<Step>,
    trigger: Option<TriggerConfig>,
}

impl DialogDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            trigger: None,
        }
    }

    /// Append a step
    pub fn step<F>(mut self, step: F) -> Self
    where
        F: Fn(&mut StepContext<'_>, StepArgs) -> StepOutcome + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn get_step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn trigger_config(&self) -> Option<&TriggerConfig> {
        self.trigger.as_ref()
    }
}

impl fmt::Debug for DialogDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .field("trigger", &self.trigger)
            .finish()
    }
}
