//! Terminal rendering of outbound messages

use async_trait::async_trait;

use supportbot_core::{AttachmentLayout, ListStyle, OutboundMessage, OutputChannel};

/// Writes every message to stdout, prefixed with the bot's name
pub struct ConsoleChannel {
    prefix: String,
}

impl ConsoleChannel {
    pub fn new(bot_name: &str) -> Self {
        Self {
            prefix: format!("{}>", bot_name),
        }
    }
}

#[async_trait]
impl OutputChannel for ConsoleChannel {
    async fn send(&self, conversation_id: &str, message: OutboundMessage) {
        tracing::debug!(conversation_id, kind = kind(&message), "Rendering message");
        for line in render(&message) {
            println!("{} {}", self.prefix, line);
        }
    }
}

fn kind(message: &OutboundMessage) -> &'static str {
    match message {
        OutboundMessage::Text { .. } => "text",
        OutboundMessage::ChoicePrompt { .. } => "choice_prompt",
        OutboundMessage::ConfirmPrompt { .. } => "confirm_prompt",
        OutboundMessage::Cards { .. } => "cards",
        OutboundMessage::SuggestedActions { .. } => "suggested_actions",
        OutboundMessage::Typing => "typing",
    }
}

/// Lines shown for one message
pub fn render(message: &OutboundMessage) -> Vec<String> {
    match message {
        OutboundMessage::Text { text } => text.lines().map(str::to_string).collect(),
        OutboundMessage::ChoicePrompt {
            text,
            options,
            list_style: ListStyle::Inline,
        } => {
            let inline = options
                .iter()
                .enumerate()
                .map(|(i, option)| format!("({}) {}", i + 1, option))
                .collect::<Vec<_>>()
                .join(", ");
            vec![format!("{} {}", text, inline)]
        }
        OutboundMessage::ChoicePrompt { text, options, .. } => {
            let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
            lines.extend(
                options
                    .iter()
                    .enumerate()
                    .map(|(i, option)| format!("  [{}] {}", i + 1, option)),
            );
            lines
        }
        OutboundMessage::ConfirmPrompt { text } => vec![format!("{} (yes/no)", text)],
        OutboundMessage::Cards { layout, cards } => {
            let mut lines = Vec::new();
            if *layout == AttachmentLayout::Carousel {
                lines.push(format!("<< {} cards >>", cards.len()));
            }
            for card in cards {
                match &card.subtitle {
                    Some(subtitle) => lines.push(format!("* {} ({})", card.title, subtitle)),
                    None => lines.push(format!("* {}", card.title)),
                }
                if let Some(text) = &card.text {
                    lines.push(format!("    {}", text));
                }
                for button in &card.buttons {
                    lines.push(format!("    -> {} [{}]", button.title, button.value));
                }
            }
            lines
        }
        OutboundMessage::SuggestedActions { text, actions } => {
            let mut lines = vec![text.clone()];
            let titles: Vec<&str> = actions.iter().map(|a| a.title.as_str()).collect();
            if !titles.is_empty() {
                lines.push(format!("  suggestions: {}", titles.join(" | ")));
            }
            lines
        }
        OutboundMessage::Typing => vec!["...".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supportbot_core::{CardAction, HeroCard};

    #[test]
    fn test_render_button_choice() {
        let lines = render(&OutboundMessage::ChoicePrompt {
            text: "Pick one".into(),
            options: vec!["Webinars".into(), "Assessments".into()],
            list_style: ListStyle::Button,
        });
        assert_eq!(lines, vec!["Pick one", "  [1] Webinars", "  [2] Assessments"]);
    }

    #[test]
    fn test_render_inline_choice() {
        let lines = render(&OutboundMessage::ChoicePrompt {
            text: "Pick one:".into(),
            options: vec!["a".into(), "b".into()],
            list_style: ListStyle::Inline,
        });
        assert_eq!(lines, vec!["Pick one: (1) a, (2) b"]);
    }

    #[test]
    fn test_render_carousel() {
        let card = HeroCard::new("Live Orientation")
            .subtitle("45 Minutes")
            .button(CardAction::im_back("Live Orientation", "Choose a Time"));
        let lines = render(&OutboundMessage::carousel(vec![card]));
        assert_eq!(lines[0], "<< 1 cards >>");
        assert_eq!(lines[1], "* Live Orientation (45 Minutes)");
        assert_eq!(lines[2], "    -> Choose a Time [Live Orientation]");
    }

    #[test]
    fn test_render_suggested_actions() {
        let lines = render(&OutboundMessage::suggested(
            "When?",
            vec![CardAction::im_back("9am", "9am"), CardAction::im_back("1pm", "1pm")],
        ));
        assert_eq!(lines, vec!["When?", "  suggestions: 9am | 1pm"]);
        assert_eq!(render(&OutboundMessage::Typing), vec!["..."]);
    }
}
