//! Prompt engine
//!
//! A prompt asks the user for a single value. Issuing one renders it to the
//! outbox and records a [`PendingPrompt`]; the next inbound message is
//! validated against it before anything else happens in the turn.
//!
//! At most one prompt is pending per conversation. Issuing a new prompt
//! before the previous one resolved replaces it: only the newest prompt is
//! answerable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use supportbot_core::{IntentResult, ListStyle, OutboundMessage};

/// Kind of value a prompt asks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptKind {
    /// One of a fixed set of options
    Choice {
        options: Vec<String>,
        #[serde(default)]
        list_style: ListStyle,
    },
    /// Free text
    Text,
    /// Yes or no
    Confirm,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Choice { .. } => "choice",
            Self::Text => "text",
            Self::Confirm => "confirm",
        }
    }
}

/// A prompt as issued by a step
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
    /// Sent right after the prompt text, e.g. cards or suggested actions
    pub followups: Vec<OutboundMessage>,
}

impl Prompt {
    /// Ask the user to pick one option
    pub fn choice<S: AsRef<str>>(text: impl Into<String>, options: &[S]) -> Self {
        Self {
            kind: PromptKind::Choice {
                options: options.iter().map(|o| o.as_ref().to_string()).collect(),
                list_style: ListStyle::Button,
            },
            text: text.into(),
            followups: Vec::new(),
        }
    }

    /// Choice prompt with options written as `"a|b|c"`
    pub fn choice_str(text: impl Into<String>, options: &str) -> Self {
        let options: Vec<&str> = options
            .split('|')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect();
        Self::choice(text, &options)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Text,
            text: text.into(),
            followups: Vec::new(),
        }
    }

    pub fn confirm(text: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Confirm,
            text: text.into(),
            followups: Vec::new(),
        }
    }

    /// Override the list style of a choice prompt
    pub fn list_style(mut self, style: ListStyle) -> Self {
        if let PromptKind::Choice { list_style, .. } = &mut self.kind {
            *list_style = style;
        }
        self
    }

    pub fn with_followup(mut self, message: OutboundMessage) -> Self {
        self.followups.push(message);
        self
    }
}

/// Where the answer to a pending prompt goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptPurpose {
    /// Resume the recorded dialog step with the answer
    Step,
    /// Decide a deferred interruption
    ConfirmInterruption {
        /// Dialog that wants to take over
        target: String,
        /// Classification that matched the target
        intent: IntentResult,
        /// Utterance that triggered the interruption
        original_input: String,
    },
}

/// The single outstanding prompt of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPrompt {
    pub kind: PromptKind,
    pub text: String,
    /// Dialog instance waiting for the answer
    pub dialog: String,
    /// Stack depth of that instance when the prompt was issued
    pub depth: usize,
    /// Step that receives the answer
    pub resume_step: usize,
    pub purpose: PromptPurpose,
}

impl PendingPrompt {
    pub fn is_interruption(&self) -> bool {
        matches!(self.purpose, PromptPurpose::ConfirmInterruption { .. })
    }
}

/// Validated answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromptAnswer {
    Choice { index: usize, value: String },
    Text(String),
    Confirm(bool),
}

impl PromptAnswer {
    /// Plain JSON form handed to parent dialogs
    pub fn into_value(self) -> Value {
        match self {
            Self::Choice { value, .. } | Self::Text(value) => Value::String(value),
            Self::Confirm(b) => Value::Bool(b),
        }
    }
}

const YES_WORDS: &[&str] = &[
    "yes", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "absolutely", "definitely",
    "certainly", "correct", "affirmative", "true",
];
const NO_WORDS: &[&str] = &["no", "n", "nope", "nah", "negative", "false", "cancel"];
const YES_PHRASES: &[&str] = &["of course", "go ahead", "please do", "do it", "sounds good"];
const NO_PHRASES: &[&str] = &["not really", "not now", "no thanks", "don't", "do not"];

/// Stateless prompt operations
pub struct PromptEngine;

impl PromptEngine {
    /// Render a prompt into the messages sent to the user
    pub fn render(prompt: &Prompt) -> Vec<OutboundMessage> {
        let mut messages = Vec::with_capacity(1 + prompt.followups.len());
        messages.push(Self::render_kind(&prompt.kind, &prompt.text));
        messages.extend(prompt.followups.iter().cloned());
        messages
    }

    /// Message that re-asks a pending prompt
    pub fn render_pending(pending: &PendingPrompt) -> OutboundMessage {
        Self::render_kind(&pending.kind, &pending.text)
    }

    fn render_kind(kind: &PromptKind, text: &str) -> OutboundMessage {
        match kind {
            PromptKind::Choice {
                options,
                list_style,
            } => OutboundMessage::ChoicePrompt {
                text: text.to_string(),
                options: options.clone(),
                list_style: *list_style,
            },
            PromptKind::Text => OutboundMessage::text(text),
            PromptKind::Confirm => OutboundMessage::ConfirmPrompt {
                text: text.to_string(),
            },
        }
    }

    /// Record a pending prompt, returning the one it replaced
    pub fn issue(
        slot: &mut Option<PendingPrompt>,
        pending: PendingPrompt,
    ) -> Option<PendingPrompt> {
        let replaced = slot.replace(pending);
        if let Some(old) = &replaced {
            tracing::debug!(
                dialog = %old.dialog,
                kind = old.kind.as_str(),
                "Pending prompt replaced before it was answered"
            );
        }
        replaced
    }

    /// Validate an utterance against a prompt kind
    pub fn validate(kind: &PromptKind, input: &str) -> Option<PromptAnswer> {
        match kind {
            PromptKind::Choice { options, .. } => Self::match_choice(options, input)
                .map(|index| PromptAnswer::Choice {
                    index,
                    value: options[index].clone(),
                }),
            PromptKind::Text => Some(PromptAnswer::Text(input.trim().to_string())),
            PromptKind::Confirm => Self::parse_confirm(input).map(PromptAnswer::Confirm),
        }
    }

    /// Exact match, 1-based ordinal, then unique substring match
    pub fn match_choice(options: &[String], input: &str) -> Option<usize> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some(index) = options
            .iter()
            .position(|o| o.trim().to_lowercase() == needle)
        {
            return Some(index);
        }

        if let Ok(ordinal) = needle.trim_end_matches('.').parse::<usize>() {
            return (1..=options.len()).contains(&ordinal).then(|| ordinal - 1);
        }

        let mut matches = options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.to_lowercase().contains(&needle));
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Some(index),
            _ => None,
        }
    }

    /// Parse a yes/no answer
    pub fn parse_confirm(input: &str) -> Option<bool> {
        let lowered = input.trim().to_lowercase();

        if NO_PHRASES.iter().any(|p| lowered.starts_with(p)) {
            return Some(false);
        }
        if YES_PHRASES.iter().any(|p| lowered.starts_with(p)) {
            return Some(true);
        }

        let first = lowered.unicode_words().next()?;
        if YES_WORDS.contains(&first) {
            Some(true)
        } else if NO_WORDS.contains(&first) {
            Some(false)
        } else {
            None
        }
    }
}
