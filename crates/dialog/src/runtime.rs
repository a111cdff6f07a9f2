//! Dialog stack runtime
//!
//! Applies [`StepOutcome`]s to one conversation's stack for the duration of
//! a turn. Everything happens on an in-memory copy of the conversation; the
//! dispatcher decides whether the result is persisted.
//!
//! # Cursor rules
//!
//! - `Suspend` moves the cursor to the next step, which receives the answer
//! - `Push` moves the cursor to the next step, which receives the child's result
//! - A cursor past the last step ends the dialog as soon as it is resumed
//! - Ending the root is a no-op that puts it back to idle

use std::mem;
use std::sync::Arc;

use serde_json::Value;

use supportbot_config::constants::dialog as defaults;
use supportbot_config::DialogConfig;
use supportbot_core::{IntentResult, OutboundMessage, StateBag};

use crate::definition::{InterruptDecision, Interruption, SelectAction};
use crate::prompt::{PendingPrompt, Prompt, PromptEngine, PromptKind, PromptPurpose};
use crate::registry::DialogRegistry;
use crate::stack::DialogInstance;
use crate::state::ConversationState;
use crate::step::{StepArgs, StepContext, StepOutcome};
use crate::DialogError;

/// Per-turn safety limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLimits {
    /// Maximum instances on the stack, root included
    pub max_stack_depth: usize,
    /// Maximum step invocations in one turn
    pub max_transitions_per_turn: usize,
}

impl RuntimeLimits {
    pub fn from_config(config: &DialogConfig) -> Self {
        Self {
            max_stack_depth: config.max_stack_depth,
            max_transitions_per_turn: config.max_transitions_per_turn,
        }
    }
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_stack_depth: defaults::MAX_STACK_DEPTH,
            max_transitions_per_turn: defaults::MAX_TRANSITIONS_PER_TURN,
        }
    }
}

/// Mutable view of one conversation during a turn
pub struct DialogRuntime<'a> {
    registry: &'a DialogRegistry,
    limits: RuntimeLimits,
    state: &'a mut ConversationState,
    conversation_data: &'a mut StateBag,
    user_data: &'a mut StateBag,
    outbox: &'a mut Vec<OutboundMessage>,
    conversation_id: &'a str,
    user_id: &'a str,
    text: &'a str,
    intent: Option<&'a IntentResult>,
    transitions: usize,
    ended: bool,
}

impl<'a> DialogRuntime<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &'a DialogRegistry,
        limits: RuntimeLimits,
        state: &'a mut ConversationState,
        conversation_data: &'a mut StateBag,
        user_data: &'a mut StateBag,
        outbox: &'a mut Vec<OutboundMessage>,
        conversation_id: &'a str,
        user_id: &'a str,
        text: &'a str,
    ) -> Self {
        Self {
            registry,
            limits,
            state,
            conversation_data,
            user_data,
            outbox,
            conversation_id,
            user_id,
            text,
            intent: None,
            transitions: 0,
            ended: false,
        }
    }

    /// Classification visible to steps as `ctx.intent()`
    pub fn set_intent(&mut self, intent: Option<&'a IntentResult>) {
        self.intent = intent;
    }

    pub fn depth(&self) -> usize {
        self.state.stack.depth()
    }

    pub fn top_dialog(&self) -> &str {
        &self.state.stack.top().dialog
    }

    pub fn is_root_only(&self) -> bool {
        self.state.stack.is_root_only()
    }

    /// The conversation was ended and nothing began afterwards
    pub fn conversation_ended(&self) -> bool {
        self.ended
    }

    pub fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn state(&self) -> &ConversationState {
        &*self.state
    }

    /// Push a dialog and invoke its first step
    pub fn begin(&mut self, name: &str, args: StepArgs) -> Result<(), DialogError> {
        self.push_instance(name)?;
        self.drive(Some(args))
    }

    /// Begin a triggered dialog, honoring its select action
    pub fn begin_triggered(&mut self, name: &str, args: StepArgs) -> Result<(), DialogError> {
        let action = self
            .registry
            .lookup(name)?
            .trigger_config()
            .map(|t| t.select_action)
            .unwrap_or_default();

        if action == SelectAction::ClearStack {
            tracing::debug!(dialog = name, depth = self.depth(), "Clearing stack before begin");
            self.state.stack.clear_to_root();
            self.state.pending_prompt = None;
        }
        self.begin(name, args)
    }

    /// End the active dialog without a result
    pub fn end(&mut self) -> Result<(), DialogError> {
        let next = self.finish_top(None)?;
        self.drive(next)
    }

    /// End the active dialog and resume its parent with `value`
    pub fn end_with_result(&mut self, value: Value) -> Result<(), DialogError> {
        let next = self.finish_top(Some(value))?;
        self.drive(next)
    }

    /// End the active dialog and begin another in its place
    pub fn replace_top(&mut self, name: &str, args: StepArgs) -> Result<(), DialogError> {
        let next = self.apply(StepOutcome::Replace(name.to_string(), args))?;
        self.drive(next)
    }

    /// Invoke the active dialog's current step
    pub fn resume_current(&mut self, args: StepArgs) -> Result<(), DialogError> {
        self.drive(Some(args))
    }

    /// Move the active dialog to its next step and invoke it
    pub fn advance(&mut self) -> Result<(), DialogError> {
        let next = self.advance_cursor()?;
        self.drive(next)
    }

    /// End the conversation: root-only stack, no prompt, no conversation data
    pub fn reset(&mut self) {
        self.state.reset();
        self.conversation_data.clear();
        self.ended = true;
        tracing::debug!(conversation_id = self.conversation_id, "Conversation reset");
    }

    /// Ask the active dialog's interruption hook, if it has one
    pub fn consult_hook(
        &mut self,
        interruption: &Interruption,
    ) -> Result<Option<InterruptDecision>, DialogError> {
        let name = self.top_dialog().to_string();
        let definition = Arc::clone(self.registry.lookup(&name)?);
        let Some(hook) = definition
            .trigger_config()
            .and_then(|t| t.on_interrupted.clone())
        else {
            return Ok(None);
        };

        let decision = self.with_top_context(name, |ctx| hook(ctx, interruption));
        Ok(Some(decision))
    }

    /// Confirmation text the active dialog asks before being interrupted
    pub fn confirm_prompt_of_top(&self) -> Result<Option<String>, DialogError> {
        Ok(self
            .registry
            .lookup(self.top_dialog())?
            .trigger_config()
            .and_then(|t| t.confirm_prompt.clone()))
    }

    /// Ask whether the active dialog may be interrupted by `target`
    pub fn defer_interruption(
        &mut self,
        text: &str,
        target: &str,
        intent: IntentResult,
        original_input: &str,
    ) {
        let depth = self.depth();
        let top = self.state.stack.top();
        let pending = PendingPrompt {
            kind: PromptKind::Confirm,
            text: text.to_string(),
            dialog: top.dialog.clone(),
            depth,
            resume_step: top.step_index,
            purpose: PromptPurpose::ConfirmInterruption {
                target: target.to_string(),
                intent,
                original_input: original_input.to_string(),
            },
        };
        self.outbox.push(PromptEngine::render_pending(&pending));
        PromptEngine::issue(&mut self.state.pending_prompt, pending);
    }

    fn drive(&mut self, mut next: Option<StepArgs>) -> Result<(), DialogError> {
        while let Some(args) = next.take() {
            next = self.invoke_top(args)?;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), DialogError> {
        self.transitions += 1;
        if self.transitions > self.limits.max_transitions_per_turn {
            tracing::warn!(
                conversation_id = self.conversation_id,
                limit = self.limits.max_transitions_per_turn,
                stack = ?self.state.stack.names(),
                "Runaway turn"
            );
            return Err(DialogError::RunawayTurn(self.limits.max_transitions_per_turn));
        }
        Ok(())
    }

    fn invoke_top(&mut self, args: StepArgs) -> Result<Option<StepArgs>, DialogError> {
        self.tick()?;

        let (name, index) = {
            let top = self.state.stack.top();
            (top.dialog.clone(), top.step_index)
        };
        let definition = Arc::clone(self.registry.lookup(&name)?);

        let Some(step) = definition.get_step(index).cloned() else {
            // Nothing left to run: the input is this dialog's result
            return self.finish_top(args.into_result());
        };

        tracing::debug!(
            conversation_id = self.conversation_id,
            dialog = %name,
            step = index,
            depth = self.depth(),
            "Invoking step"
        );

        self.state.stack.top_mut().awaiting_prompt = false;
        let outcome = self.with_top_context(name, |ctx| step(ctx, args));
        self.apply(outcome)
    }

    fn with_top_context<R>(
        &mut self,
        dialog: String,
        f: impl FnOnce(&mut StepContext<'_>) -> R,
    ) -> R {
        let dialog_data = mem::take(&mut self.state.stack.top_mut().dialog_data);
        let mut ctx = StepContext {
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            text: self.text,
            intent: self.intent,
            dialog,
            dialog_data,
            conversation_data: &mut *self.conversation_data,
            user_data: &mut *self.user_data,
            outbox: &mut *self.outbox,
        };
        let result = f(&mut ctx);
        let dialog_data = ctx.dialog_data;
        self.state.stack.top_mut().dialog_data = dialog_data;
        result
    }

    fn apply(&mut self, outcome: StepOutcome) -> Result<Option<StepArgs>, DialogError> {
        match outcome {
            StepOutcome::Suspend(prompt) => {
                self.suspend(prompt);
                Ok(None)
            }
            StepOutcome::Advance => self.advance_cursor(),
            StepOutcome::Push(name, args) => {
                self.registry.lookup(&name)?;
                self.state.stack.top_mut().step_index += 1;
                self.push_instance(&name)?;
                Ok(Some(args))
            }
            StepOutcome::Pop(result) => self.finish_top(result),
            StepOutcome::Replace(name, args) => {
                self.registry.lookup(&name)?;
                match self.state.stack.pop() {
                    Some(old) => {
                        tracing::debug!(from = %old.dialog, to = %name, "Replacing dialog")
                    }
                    None => self.idle_root(),
                }
                self.push_instance(&name)?;
                Ok(Some(args))
            }
            StepOutcome::Done => Ok(None),
            StepOutcome::EndConversation => {
                self.reset();
                Ok(None)
            }
            StepOutcome::Restart(name, args) => {
                self.registry.lookup(&name)?;
                self.reset();
                self.push_instance(&name)?;
                Ok(Some(args))
            }
        }
    }

    fn suspend(&mut self, prompt: Prompt) {
        let depth = self.depth();
        let top = self.state.stack.top_mut();
        top.step_index += 1;
        top.awaiting_prompt = true;

        let pending = PendingPrompt {
            kind: prompt.kind.clone(),
            text: prompt.text.clone(),
            dialog: top.dialog.clone(),
            depth,
            resume_step: top.step_index,
            purpose: PromptPurpose::Step,
        };
        tracing::debug!(
            dialog = %pending.dialog,
            kind = pending.kind.as_str(),
            resume_step = pending.resume_step,
            "Prompt issued"
        );

        self.outbox.extend(PromptEngine::render(&prompt));
        PromptEngine::issue(&mut self.state.pending_prompt, pending);
    }

    fn advance_cursor(&mut self) -> Result<Option<StepArgs>, DialogError> {
        let name = self.top_dialog().to_string();
        let count = self.registry.lookup(&name)?.step_count();

        let top = self.state.stack.top_mut();
        top.step_index += 1;
        top.awaiting_prompt = false;
        if top.step_index < count {
            Ok(Some(StepArgs::None))
        } else {
            self.finish_top(None)
        }
    }

    fn push_instance(&mut self, name: &str) -> Result<(), DialogError> {
        self.registry.lookup(name)?;
        if self.depth() + 1 > self.limits.max_stack_depth {
            tracing::warn!(
                conversation_id = self.conversation_id,
                dialog = name,
                limit = self.limits.max_stack_depth,
                stack = ?self.state.stack.names(),
                "Dialog stack overflow"
            );
            return Err(DialogError::StackOverflow(self.limits.max_stack_depth));
        }

        self.state.stack.push(DialogInstance::new(name));
        self.ended = false;
        tracing::debug!(dialog = name, depth = self.depth(), "Dialog began");
        Ok(())
    }

    fn idle_root(&mut self) {
        let root = self.state.stack.top_mut();
        root.step_index = 0;
        root.awaiting_prompt = false;
    }

    /// Pop the active dialog and find who receives `result`
    ///
    /// Parents with no steps left end too, passing the result upwards.
    fn finish_top(&mut self, result: Option<Value>) -> Result<Option<StepArgs>, DialogError> {
        let Some(ended) = self.state.stack.pop() else {
            self.idle_root();
            return Ok(None);
        };
        tracing::debug!(
            dialog = %ended.dialog,
            depth = self.depth(),
            has_result = result.is_some(),
            "Dialog ended"
        );

        loop {
            let (name, index) = {
                let top = self.state.stack.top();
                (top.dialog.clone(), top.step_index)
            };
            let count = self.registry.lookup(&name)?.step_count();

            if index < count {
                return Ok(result.map(StepArgs::Response));
            }
            if self.state.stack.pop().is_none() {
                self.idle_root();
                return Ok(result.map(StepArgs::Response));
            }
            tracing::debug!(dialog = %name, "Parent had no steps left, ended");
        }
    }
}
