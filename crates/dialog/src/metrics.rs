//! Dialog engine counters
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host installs a recorder.

use metrics::{counter, describe_counter};

pub const TURNS_TOTAL: &str = "supportbot_turns_total";
pub const INTERRUPTIONS_TOTAL: &str = "supportbot_interruptions_total";
pub const REPROMPTS_TOTAL: &str = "supportbot_reprompts_total";
pub const CLASSIFIER_FAILURES_TOTAL: &str = "supportbot_classifier_failures_total";
pub const DIALOG_ERRORS_TOTAL: &str = "supportbot_dialog_errors_total";

/// Register descriptions with the installed recorder
pub fn describe() {
    describe_counter!(TURNS_TOTAL, "Turns handled, by outcome");
    describe_counter!(INTERRUPTIONS_TOTAL, "Dialogs begun by interrupting another dialog");
    describe_counter!(REPROMPTS_TOTAL, "Prompts re-sent after an invalid answer");
    describe_counter!(CLASSIFIER_FAILURES_TOTAL, "Failed or timed out classifier calls");
    describe_counter!(DIALOG_ERRORS_TOTAL, "Turns aborted by a dialog engine error");
}

pub fn record_turn(outcome: &'static str) {
    counter!(TURNS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_interruption(decision: &'static str) {
    counter!(INTERRUPTIONS_TOTAL, "decision" => decision).increment(1);
}

pub fn record_reprompt(kind: &'static str) {
    counter!(REPROMPTS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_classifier_failure(classifier: &str) {
    counter!(CLASSIFIER_FAILURES_TOTAL, "classifier" => classifier.to_string()).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!(DIALOG_ERRORS_TOTAL, "kind" => kind).increment(1);
}
