//! Webinar conversation, booking walkthrough and information
//!
//! `WebinarTalkDialog` asks whether to book and reads the intent of the
//! reply. While it waits, answer intents are kept away from their own
//! dialogs by its interruption hook so the reply reaches the step.

use std::sync::Arc;

use serde_json::json;

use supportbot_config::BotSettings;
use supportbot_core::OutboundMessage;
use supportbot_dialog::{
    DialogDefinition, InterruptDecision, Prompt, PromptEngine, StepOutcome, TriggerConfig,
};

use crate::cards::{self, BOOKING_REPLIES, TIME_SLOTS, WEBINAR_INFO_URL};
use crate::{answer_text, debug_talk, dialogs, intents, keys};

pub const CONFIRM_CANCEL: &str = "Do you want to cancel the current task and talk about it?";

const CHOICES_SEEN: &str = "choicesSeen";
const CHOICE: &str = "choice";
const CHOICE_BOOK: &str = "bookWebinar";
const CHOICE_INFO: &str = "infoWebinar";
const WEBINAR: &str = "webinar";
const TIME: &str = "time";

pub(crate) fn dialogs(settings: &Arc<BotSettings>) -> Vec<DialogDefinition> {
    vec![talk(settings), book(settings), info()]
}

fn talk(settings: &Arc<BotSettings>) -> DialogDefinition {
    let settings = Arc::clone(settings);

    DialogDefinition::new(dialogs::WEBINAR_TALK)
        .step(|ctx, _| {
            if !ctx.dialog_data.flag(CHOICES_SEEN) {
                ctx.dialog_data.set(CHOICES_SEEN, true);
                ctx.send_text(
                    "So let's talk about webinars. Would you like me to book this for you today?",
                );
                return StepOutcome::Done;
            }

            let choice = match ctx.top_intent() {
                Some(intents::AFFIRMATIVE) | Some(intents::BOOK_WEBINAR) => CHOICE_BOOK,
                Some(intents::NEGATIVE) | Some(intents::ASKING_INFO) => CHOICE_INFO,
                Some(intents::NONE) | None => return StepOutcome::push(dialogs::NONE),
                Some(_) => {
                    ctx.send_text("Im afraid I didnt get what you mean...");
                    return StepOutcome::Done;
                }
            };
            ctx.dialog_data.set(CHOICE, choice);
            StepOutcome::Advance
        })
        .step(move |ctx, _| {
            let said = ctx.text().to_string();
            debug_talk(ctx, &settings, format!("received this as answer: '{}'", said));

            match ctx.dialog_data.get_str(CHOICE) {
                Some(CHOICE_BOOK) => {
                    ctx.send_text("Great. Lets book it.");
                    StepOutcome::push(dialogs::BOOK_WEBINAR)
                }
                Some(CHOICE_INFO) => {
                    ctx.send_text("Ok. Let me try to help you.");
                    StepOutcome::push(dialogs::INFO_WEBINAR)
                }
                _ => StepOutcome::Pop(None),
            }
        })
        .trigger(
            TriggerConfig::new(intents::BOOK_WEBINAR).on_interrupted(|ctx, interruption| {
                let intent = interruption.intent.intent.as_str();
                if intent == intents::AFFIRMATIVE || intent == intents::NEGATIVE {
                    return InterruptDecision::Suppress;
                }
                ctx.send_text(format!("Looks like you want to talk about '{}' now.", intent));
                InterruptDecision::Allow
            }),
        )
}

fn book(settings: &Arc<BotSettings>) -> DialogDefinition {
    let settings = Arc::clone(settings);

    DialogDefinition::new(dialogs::BOOK_WEBINAR)
        .step(|_, _| {
            StepOutcome::Suspend(
                Prompt::text("Select the right webinar for you:")
                    .with_followup(OutboundMessage::carousel(cards::webinar_cards())),
            )
        })
        .step(|ctx, args| {
            let reply = answer_text(&args);
            let webinar = cards::find_webinar(&reply)
                .map(|w| w.title.to_string())
                .unwrap_or(reply);
            ctx.dialog_data.set(WEBINAR, webinar);

            StepOutcome::Suspend(Prompt::text("Sure thing.").with_followup(
                OutboundMessage::suggested(
                    "Now lets pick a day and time that works for you.",
                    cards::im_back_actions(TIME_SLOTS),
                ),
            ))
        })
        .step(|ctx, args| {
            let time = answer_text(&args);
            let webinar = ctx.dialog_data.get_str(WEBINAR).unwrap_or_default().to_string();
            ctx.dialog_data.set(TIME, time.clone());

            StepOutcome::Suspend(
                Prompt::text(format!(
                    "You have requested to attend a {} Webinar on {}",
                    webinar, time
                ))
                .with_followup(OutboundMessage::suggested(
                    "Would you like me to book this for you?",
                    cards::im_back_actions(BOOKING_REPLIES),
                )),
            )
        })
        .step(move |ctx, args| {
            let reply = answer_text(&args);
            debug_talk(ctx, &settings, format!("received this as answer: '{}'", reply));

            let options: Vec<String> = BOOKING_REPLIES.iter().map(|s| s.to_string()).collect();
            let declined = match PromptEngine::match_choice(&options, &reply) {
                Some(2) => {
                    ctx.user_data.set(keys::NO_START_GREET, true);
                    return StepOutcome::restart(dialogs::GREETING);
                }
                Some(index) => index == 1,
                None => PromptEngine::parse_confirm(&reply) == Some(false),
            };

            if declined {
                ctx.send_text("No problem, I haven't booked anything.");
            } else {
                let booking = json!({
                    "webinar": ctx.dialog_data.get_str(WEBINAR),
                    "time": ctx.dialog_data.get_str(TIME),
                });
                ctx.conversation_data.set(keys::BOOKED_WEBINAR, booking);
                ctx.send_text(
                    "Done, you will receive an email with all the details. I hope you enjoy this session.",
                );
            }
            StepOutcome::replace(dialogs::ENDING_HELP)
        })
        .trigger(TriggerConfig::interruption_only().confirm_prompt(CONFIRM_CANCEL))
}

fn info() -> DialogDefinition {
    DialogDefinition::new(dialogs::INFO_WEBINAR).step(|ctx, _| {
        ctx.send_text("You can find all the information you need about webinars right here.");
        ctx.send_text(WEBINAR_INFO_URL);
        StepOutcome::replace(dialogs::ENDING_HELP)
    })
}
