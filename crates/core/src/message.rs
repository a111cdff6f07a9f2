//! Outbound message payloads
//!
//! The dialog engine never renders anything itself. It hands these
//! structured payloads to an [`OutputChannel`](crate::OutputChannel) which
//! decides how to draw buttons, carousels and suggested actions.

use serde::{Deserialize, Serialize};

/// How a choice prompt lists its options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    /// One button per option
    #[default]
    Button,
    /// Options inlined in the prompt text ("(1) a, (2) b")
    Inline,
}

/// Layout for a group of cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentLayout {
    #[default]
    List,
    Carousel,
}

/// Button or suggested action that posts text back as the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAction {
    /// Text sent back when the action is selected
    pub value: String,
    /// Label shown to the user
    pub title: String,
}

impl CardAction {
    /// Action that posts its value back as if the user typed it
    pub fn im_back(value: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            title: title.into(),
        }
    }
}

/// Image shown on a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImage {
    pub url: String,
}

/// Rich card with a title, text, images and buttons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroCard {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<CardImage>,
    #[serde(default)]
    pub buttons: Vec<CardAction>,
}

impl HeroCard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.images.push(CardImage { url: url.into() });
        self
    }

    pub fn button(mut self, action: CardAction) -> Self {
        self.buttons.push(action);
        self
    }
}

/// Message sent to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain text
    Text { text: String },
    /// Prompt offering a fixed set of options
    ChoicePrompt {
        text: String,
        options: Vec<String>,
        list_style: ListStyle,
    },
    /// Yes/no prompt
    ConfirmPrompt { text: String },
    /// One or more rich cards
    Cards {
        layout: AttachmentLayout,
        cards: Vec<HeroCard>,
    },
    /// Text with quick-reply actions that disappear once used
    SuggestedActions {
        text: String,
        actions: Vec<CardAction>,
    },
    /// Typing indicator
    Typing,
}

impl OutboundMessage {
    /// Create a plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a carousel of cards
    pub fn carousel(cards: Vec<HeroCard>) -> Self {
        Self::Cards {
            layout: AttachmentLayout::Carousel,
            cards,
        }
    }

    /// Create a suggested actions message
    pub fn suggested(text: impl Into<String>, actions: Vec<CardAction>) -> Self {
        Self::SuggestedActions {
            text: text.into(),
            actions,
        }
    }

    /// Primary text of the message, if it has one
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text { text }
            | Self::ChoicePrompt { text, .. }
            | Self::ConfirmPrompt { text }
            | Self::SuggestedActions { text, .. } => Some(text),
            Self::Cards { .. } | Self::Typing => None,
        }
    }

    /// Whether this message asks the user for input
    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::ChoicePrompt { .. } | Self::ConfirmPrompt { .. })
    }
}
