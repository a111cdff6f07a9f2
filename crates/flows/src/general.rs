//! Assessment stubs, yes/no answer dialogs and the farewell

use std::sync::Arc;

use supportbot_config::BotSettings;
use supportbot_dialog::{DialogDefinition, StepOutcome, TriggerConfig};

use crate::{debug_talk, dialogs, intents};

pub(crate) fn dialogs(settings: &Arc<BotSettings>) -> Vec<DialogDefinition> {
    vec![
        assessment(
            settings,
            dialogs::FIND_ASSESSMENT,
            intents::FIND_ASSESSMENT,
            "You can find all of your assessments under My Assessments in the student portal.",
        ),
        assessment(
            settings,
            dialogs::SUBMIT_ASSESSMENT,
            intents::SUBMIT_ASSESSMENT,
            "You can submit your assessment from the assessment page in the student portal.",
        ),
        answer(dialogs::AFFIRMATIVE_ANSWER, intents::AFFIRMATIVE, true),
        answer(dialogs::NEGATIVE_ANSWER, intents::NEGATIVE, false),
        end_conversation(),
    ]
}

fn assessment(
    settings: &Arc<BotSettings>,
    name: &'static str,
    intent: &str,
    reply: &'static str,
) -> DialogDefinition {
    let settings = Arc::clone(settings);
    DialogDefinition::new(name)
        .step(move |ctx, _| {
            let said = ctx.text().to_string();
            debug_talk(
                ctx,
                &settings,
                format!("You reached the {} intent. You said '{}'.", name, said),
            );
            ctx.send_text(reply);
            StepOutcome::Pop(None)
        })
        .trigger(TriggerConfig::new(intent))
}

/// Ends immediately, reporting the answer to the dialog below
fn answer(name: &str, intent: &str, value: bool) -> DialogDefinition {
    DialogDefinition::new(name)
        .step(move |_, _| StepOutcome::pop_with(value))
        .trigger(TriggerConfig::new(intent))
}

fn end_conversation() -> DialogDefinition {
    DialogDefinition::new(dialogs::END_CONVERSATION)
        .step(|ctx, _| {
            ctx.send_text("Nice speaking to you today. See you again soon!");
            StepOutcome::EndConversation
        })
        .trigger(TriggerConfig::new(intents::END_CONVERSATION))
}
