//! Student support conversation flows
//!
//! Dialogs of the student support bot: greeting, webinar booking, support
//! escalation, trainer messaging and the small answer dialogs used to report
//! yes/no back to whichever dialog asked.
//!
//! ```text
//! Greet ──► GreetingDialog ──► WebinarTalkDialog ──► BookWebinarDialog ─┐
//!                   │                    └─────────► InfoWebinarDialog ─┤
//!                   ├──► FindAssessmentDialog                           ▼
//!                   └──► TrainerDialog                        EndingHelpDialog
//! None ──► NoneDialog ─────────────────────────────────────────────────┘
//! ```

pub mod cards;
pub mod general;
pub mod greeting;
pub mod support;
pub mod webinar;

use std::sync::Arc;

use supportbot_config::{BotSettings, DialogConfig};
use supportbot_dialog::{
    DialogDefinition, DialogError, DialogRegistry, DialogRegistryBuilder, PromptAnswer,
    StepArgs, StepContext,
};

/// Registered dialog names
pub mod dialogs {
    pub const GREETING: &str = "GreetingDialog";
    pub const FIND_ASSESSMENT: &str = "FindAssessmentDialog";
    pub const SUBMIT_ASSESSMENT: &str = "SubmitAssessmentDialog";
    pub const WEBINAR_TALK: &str = "WebinarTalkDialog";
    pub const BOOK_WEBINAR: &str = "BookWebinarDialog";
    pub const INFO_WEBINAR: &str = "InfoWebinarDialog";
    pub const NONE: &str = "NoneDialog";
    pub const HELP: &str = "HelpDialog";
    pub const ENDING_HELP: &str = "EndingHelpDialog";
    pub const TRAINER: &str = "TrainerDialog";
    pub const AFFIRMATIVE_ANSWER: &str = "AffirmativeAnswerDialog";
    pub const NEGATIVE_ANSWER: &str = "NegativeAnswerDialog";
    pub const END_CONVERSATION: &str = "EndConversationDialog";
}

/// Intents the flows react to
pub mod intents {
    pub const GREET: &str = "Greet";
    pub const BOOK_WEBINAR: &str = "BookWebinar";
    pub const FIND_ASSESSMENT: &str = "FindAssessment";
    pub const SUBMIT_ASSESSMENT: &str = "SubmitAssessment";
    pub const MESSAGE_TRAINER: &str = "MessageTrainer";
    pub const CONTACT_SUPPORT: &str = "ContactSupport";
    pub const AFFIRMATIVE: &str = "AffirmativeAnswer";
    pub const NEGATIVE: &str = "NegativeAnswer";
    pub const ASKING_INFO: &str = "AskingInfo";
    pub const END_CONVERSATION: &str = "EndConversation";
    pub const NONE: &str = "None";
}

/// State keys shared between dialogs
pub mod keys {
    /// conversation: the opening menu was shown
    pub const GREET_DONE: &str = "greetDone";
    /// user: skip the introduction when greeting again
    pub const NO_START_GREET: &str = "noStartGreet";
    /// conversation: last support case opened
    pub const CASE_NUMBER: &str = "caseNumber";
    /// conversation: last webinar booked
    pub const BOOKED_WEBINAR: &str = "bookedWebinar";
    /// user: last message left for the trainer
    pub const TRAINER_MESSAGE: &str = "trainerMessage";
}

/// Registry with default dialog configuration
pub fn build_registry(settings: &BotSettings) -> Result<DialogRegistry, DialogError> {
    build_registry_with(&DialogConfig::default(), settings)
}

/// Registry using the root and fallback names from `config`
pub fn build_registry_with(
    config: &DialogConfig,
    settings: &BotSettings,
) -> Result<DialogRegistry, DialogError> {
    let settings = Arc::new(settings.clone());
    let mut builder = DialogRegistryBuilder::from_config(config);

    let definitions: Vec<DialogDefinition> = [
        greeting::dialogs(&settings),
        webinar::dialogs(&settings),
        support::dialogs(&settings),
        general::dialogs(&settings),
    ]
    .into_iter()
    .flatten()
    .collect();

    for definition in definitions {
        builder.register(definition)?;
    }
    builder.build()
}

/// Echo diagnostics to the user when debug talk is on
pub(crate) fn debug_talk(ctx: &mut StepContext<'_>, settings: &BotSettings, text: String) {
    if settings.debug_talk {
        ctx.send_text(text);
    }
}

/// Text of a prompt answer, empty when the step was not resumed by one
pub(crate) fn answer_text(args: &StepArgs) -> String {
    match args.answer() {
        Some(PromptAnswer::Text(text)) => text.clone(),
        Some(PromptAnswer::Choice { value, .. }) => value.clone(),
        Some(PromptAnswer::Confirm(yes)) => yes.to_string(),
        None => String::new(),
    }
}
