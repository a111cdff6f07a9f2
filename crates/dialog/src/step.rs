//! Step invocation types
//!
//! A dialog is an ordered list of steps. Each step receives a
//! [`StepContext`] and the [`StepArgs`] it was invoked with, and returns a
//! [`StepOutcome`] telling the runtime what to do next.

use serde_json::Value;

use supportbot_core::{IntentResult, OutboundMessage, StateBag};

use crate::prompt::{Prompt, PromptAnswer};

/// Input handed to a step
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StepArgs {
    /// Nothing, e.g. after `Advance`
    #[default]
    None,
    /// Raw user utterance delivered to the current step
    Message(String),
    /// The classification that triggered this dialog
    Intent(IntentResult),
    /// Validated answer to a prompt
    Answer(PromptAnswer),
    /// Result returned by a child dialog
    Response(Value),
    /// Arbitrary value passed by the caller of `begin`
    Value(Value),
}

impl StepArgs {
    pub fn answer(&self) -> Option<&PromptAnswer> {
        match self {
            Self::Answer(answer) => Some(answer),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&Value> {
        match self {
            Self::Response(value) => Some(value),
            _ => None,
        }
    }

    /// Index of the chosen option when this is a choice answer
    pub fn choice_index(&self) -> Option<usize> {
        match self {
            Self::Answer(PromptAnswer::Choice { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// Boolean carried by a confirm answer or a boolean child result
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Answer(PromptAnswer::Confirm(yes)) => Some(*yes),
            Self::Response(Value::Bool(b)) | Self::Value(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Value returned to a parent when this input ends a dialog
    pub fn into_result(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Message(text) => Some(Value::String(text)),
            Self::Intent(result) => serde_json::to_value(result).ok(),
            Self::Answer(answer) => Some(answer.into_value()),
            Self::Response(value) | Self::Value(value) => Some(value),
        }
    }
}

/// What the runtime does after a step returns
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Issue a prompt and wait for the answer
    Suspend(Prompt),
    /// Invoke the next step with no args
    Advance,
    /// Begin a child dialog; this dialog continues at the next step
    Push(String, StepArgs),
    /// End this dialog, optionally returning a result to the parent
    Pop(Option<Value>),
    /// End this dialog and begin another in its place
    Replace(String, StepArgs),
    /// Stay on this step; the next message re-invokes it
    Done,
    /// Clear the stack and conversation data
    EndConversation,
    /// End the conversation, then begin a dialog on the fresh stack
    Restart(String, StepArgs),
}

impl StepOutcome {
    pub fn push(dialog: &str) -> Self {
        Self::Push(dialog.to_string(), StepArgs::None)
    }

    pub fn replace(dialog: &str) -> Self {
        Self::Replace(dialog.to_string(), StepArgs::None)
    }

    pub fn restart(dialog: &str) -> Self {
        Self::Restart(dialog.to_string(), StepArgs::None)
    }

    /// End with a result
    pub fn pop_with(value: impl Into<Value>) -> Self {
        Self::Pop(Some(value.into()))
    }
}

/// Everything a step can see and touch during one invocation
pub struct StepContext<'a> {
    pub(crate) conversation_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) text: &'a str,
    pub(crate) intent: Option<&'a IntentResult>,
    pub(crate) dialog: String,
    /// Data scoped to this dialog instance, discarded when it ends
    pub dialog_data: StateBag,
    /// Data scoped to the conversation
    pub conversation_data: &'a mut StateBag,
    /// Data scoped to the user across conversations
    pub user_data: &'a mut StateBag,
    pub(crate) outbox: &'a mut Vec<OutboundMessage>,
}

impl<'a> StepContext<'a> {
    pub fn conversation_id(&self) -> &str {
        self.conversation_id
    }

    pub fn user_id(&self) -> &str {
        self.user_id
    }

    /// Raw utterance of the current turn
    pub fn text(&self) -> &str {
        self.text
    }

    /// This turn's classification, if the utterance was classified
    pub fn intent(&self) -> Option<&IntentResult> {
        self.intent
    }

    /// Name of the best intent of this turn
    pub fn top_intent(&self) -> Option<&str> {
        self.intent
            .and_then(|r| r.best())
            .map(|i| i.intent.as_str())
    }

    /// Name of the dialog owning the running step
    pub fn dialog(&self) -> &str {
        &self.dialog
    }

    /// Queue a message for the output channel
    pub fn send(&mut self, message: OutboundMessage) {
        self.outbox.push(message);
    }

    pub fn send_text(&mut self, text: impl Into<String>) {
        self.outbox.push(OutboundMessage::text(text));
    }

    pub fn send_typing(&mut self) {
        self.outbox.push(OutboundMessage::Typing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_bool_reads_answers_and_results() {
        assert_eq!(StepArgs::Answer(PromptAnswer::Confirm(true)).as_bool(), Some(true));
        assert_eq!(StepArgs::Response(json!(false)).as_bool(), Some(false));
        assert_eq!(StepArgs::Message("yes".into()).as_bool(), None);
    }

    #[test]
    fn test_into_result() {
        let answer = StepArgs::Answer(PromptAnswer::Choice {
            index: 1,
            value: "My Assessments".into(),
        });
        assert_eq!(answer.into_result(), Some(json!("My Assessments")));
        assert_eq!(StepArgs::None.into_result(), None);
        assert_eq!(StepArgs::Response(json!(3)).into_result(), Some(json!(3)));
    }

    #[test]
    fn test_context_queues_messages() {
        let mut conversation = StateBag::new();
        let mut user = StateBag::new();
        let mut outbox = Vec::new();
        let mut ctx = StepContext {
            conversation_id: "c1",
            user_id: "u1",
            text: "hi",
            intent: None,
            dialog: "Greeting".into(),
            dialog_data: StateBag::new(),
            conversation_data: &mut conversation,
            user_data: &mut user,
            outbox: &mut outbox,
        };

        ctx.send_typing();
        ctx.send_text("hello");
        ctx.conversation_data.set("greetDone", true);

        assert_eq!(ctx.top_intent(), None);
        assert_eq!(outbox.len(), 2);
        assert!(conversation.flag("greetDone"));
    }
}
