//! Greeting and opening menu

use std::sync::Arc;

use rand::seq::SliceRandom;

use supportbot_config::BotSettings;
use supportbot_dialog::{DialogDefinition, Prompt, StepOutcome, TriggerConfig};

use crate::{dialogs, intents, keys};

/// Short replies for users greeting again in the same conversation
pub const GREETINGS: &[&str] = &[
    "Hello, let's see if I can help you",
    "Hi there! let's see if I can help you",
    "Hi, let's see if I can help you",
];

pub const MENU_OPTIONS: &str = "Book a Webinar|My Assessments|Message my trainer";
pub const MENU_SHORT_INTRO: &str = "These are things I can help you with:";

pub(crate) fn dialogs(settings: &Arc<BotSettings>) -> Vec<DialogDefinition> {
    vec![greeting(settings)]
}

fn greeting(settings: &Arc<BotSettings>) -> DialogDefinition {
    let settings = Arc::clone(settings);

    DialogDefinition::new(dialogs::GREETING)
        .step(move |ctx, _| {
            ctx.send_typing();

            if ctx.conversation_data.flag(keys::GREET_DONE) {
                let reply = GREETINGS
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(GREETINGS[0]);
                ctx.send_text(reply);
                return StepOutcome::Pop(None);
            }

            ctx.conversation_data.set(keys::GREET_DONE, true);
            let intro = if ctx.user_data.flag(keys::NO_START_GREET) {
                MENU_SHORT_INTRO.to_string()
            } else {
                format!(
                    "Hi there {}! I am Frankie your supportbot. What can I help you with today?",
                    settings.user_name
                )
            };
            StepOutcome::Suspend(Prompt::choice_str(intro, MENU_OPTIONS))
        })
        .step(|_, args| match args.choice_index() {
            Some(0) => StepOutcome::replace(dialogs::WEBINAR_TALK),
            Some(1) => StepOutcome::replace(dialogs::FIND_ASSESSMENT),
            Some(2) => StepOutcome::replace(dialogs::TRAINER),
            _ => StepOutcome::Pop(None),
        })
        // Nested so the user returns to what they were doing afterwards
        .trigger(TriggerConfig::new(intents::GREET))
}
