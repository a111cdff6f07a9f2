//! Support escalation, help menus and trainer messaging

use std::sync::Arc;

use rand::Rng;

use supportbot_config::BotSettings;
use supportbot_core::ListStyle;
use supportbot_dialog::{DialogDefinition, Prompt, StepArgs, StepOutcome, TriggerConfig};

use crate::{answer_text, dialogs, intents, keys};

pub const SUPPORT_OPTIONS: &str =
    "Go to our support page|Send enquiry to support team|Connect to a live agent";

const ASK_HELP_SEEN: &str = "askHelpSeen";
const SUPPORT_OPTION: &str = "supportOption";

pub(crate) fn dialogs(settings: &Arc<BotSettings>) -> Vec<DialogDefinition> {
    vec![
        none(),
        help(
            settings,
            dialogs::HELP,
            "No problem. How can I help you?",
            Some(TriggerConfig::new(intents::CONTACT_SUPPORT).clear_stack()),
        ),
        help(
            settings,
            dialogs::ENDING_HELP,
            "Can I help you with anything else today?",
            None,
        ),
        trainer(settings),
    ]
}

/// Nine digit support case number
fn case_number() -> String {
    format!("{:09}", rand::thread_rng().gen_range(0..1_000_000_000u32))
}

fn none() -> DialogDefinition {
    DialogDefinition::new(dialogs::NONE)
        .step(|_, _| {
            StepOutcome::Suspend(
                Prompt::choice_str(
                    "As I am still learning, I won't be able to help you with this question today!\nBut let me point you in the right direction.",
                    SUPPORT_OPTIONS,
                )
                .list_style(ListStyle::Button),
            )
        })
        .step(|ctx, args| {
            ctx.dialog_data.set(SUPPORT_OPTION, answer_text(&args));
            StepOutcome::Suspend(Prompt::confirm(
                "Sure thing! The team will contact you within 48 hours. Would you like me to send this enquiry now?",
            ))
        })
        .step(|ctx, args| {
            if args.as_bool() == Some(true) {
                let case = case_number();
                tracing::info!(
                    conversation_id = ctx.conversation_id(),
                    case = %case,
                    option = ctx.dialog_data.get_str(SUPPORT_OPTION).unwrap_or("-"),
                    "Support enquiry sent"
                );
                ctx.send_text(format!("Done! Your case number is {}", case));
                ctx.conversation_data.set(keys::CASE_NUMBER, case);
            } else {
                ctx.send_text("No worries, I haven't sent anything.");
            }
            StepOutcome::replace(dialogs::ENDING_HELP)
        })
        .trigger(TriggerConfig::new(intents::NONE))
}

/// Open question followed by goodbye
///
/// Yes (directly or through the answer dialogs) starts over with a short
/// menu, an unrecognised request goes to the support options, anything else
/// says goodbye and ends the conversation.
fn help(
    settings: &Arc<BotSettings>,
    name: &str,
    question: &'static str,
    trigger: Option<TriggerConfig>,
) -> DialogDefinition {
    let farewell = format!("Enjoy your day {}. See you again soon.", settings.user_name);

    let definition = DialogDefinition::new(name)
        .step(move |ctx, args| {
            if !ctx.dialog_data.flag(ASK_HELP_SEEN) {
                ctx.dialog_data.set(ASK_HELP_SEEN, true);
                ctx.send_text(question);
                return StepOutcome::Done;
            }

            let wants_more = match &args {
                StepArgs::Response(_) => args.as_bool(),
                _ => match ctx.top_intent() {
                    Some(intents::AFFIRMATIVE) => Some(true),
                    Some(intents::NONE) | None => return StepOutcome::push(dialogs::NONE),
                    _ => None,
                },
            };

            if wants_more == Some(true) {
                ctx.user_data.set(keys::NO_START_GREET, true);
                return StepOutcome::restart(dialogs::GREETING);
            }
            StepOutcome::Advance
        })
        .step(move |ctx, _| {
            ctx.send_text(farewell.clone());
            StepOutcome::Advance
        })
        .step(|_, _| StepOutcome::EndConversation);

    match trigger {
        Some(trigger) => definition.trigger(trigger),
        None => definition,
    }
}

fn trainer(settings: &Arc<BotSettings>) -> DialogDefinition {
    let user_name = settings.user_name.clone();

    DialogDefinition::new(dialogs::TRAINER)
        .step(|_, _| {
            StepOutcome::Suspend(Prompt::confirm(
                "Would you like me to pass a message on to your trainer?",
            ))
        })
        .step(|ctx, args| {
            if args.as_bool() == Some(true) {
                StepOutcome::Suspend(Prompt::text("What would you like to tell your trainer?"))
            } else {
                ctx.send_text("No problem.");
                StepOutcome::replace(dialogs::ENDING_HELP)
            }
        })
        .step(move |ctx, args| {
            ctx.user_data.set(keys::TRAINER_MESSAGE, answer_text(&args));
            ctx.send_text(format!(
                "Your trainer will get back to you soon. Enjoy your day {}. See you again soon.",
                user_name
            ));
            StepOutcome::EndConversation
        })
        .trigger(TriggerConfig::new(intents::MESSAGE_TRAINER))
}
