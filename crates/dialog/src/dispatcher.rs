//! Turn dispatcher
//!
//! Handles one inbound [`Activity`] at a time per conversation:
//!
//! 1. A pending prompt exists: validate the utterance against it. Valid
//!    answers resume the waiting step (or decide a deferred interruption),
//!    invalid ones re-send the prompt. Nothing is classified.
//! 2. Otherwise classify the utterance and either begin the fallback dialog,
//!    hand the message to the active step, or interrupt it with the dialog
//!    whose trigger matched.
//!
//! All changes are made on an in-memory copy of the conversation and
//! committed in one store write once the turn completes. A classifier
//! failure abandons the turn without sending or storing anything.
//!
//! Turns hold the conversation lock and then the user lock, in that order,
//! so two conversations of the same user never interleave their user data.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::Instrument;

use supportbot_config::constants::{classifier as classifier_defaults, dialog as defaults};
use supportbot_config::{ClassifierConfig, DialogConfig};
use supportbot_core::{
    Activity, ClassifierError, IntentClassifier, IntentResult, OutboundMessage, OutputChannel,
    StateBag, StateScope, StateStore, StateWrite,
};

use crate::definition::{InterruptDecision, Interruption};
use crate::metrics;
use crate::prompt::{PendingPrompt, PromptAnswer, PromptEngine, PromptPurpose};
use crate::registry::DialogRegistry;
use crate::runtime::{DialogRuntime, RuntimeLimits};
use crate::state::ConversationState;
use crate::step::StepArgs;
use crate::DialogError;

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Intent identifier treated as "nothing matched"
    pub fallback_intent: String,
    /// Intents scoring below this are ignored
    pub min_confidence: f32,
    pub limits: RuntimeLimits,
    /// Upper bound on one classifier call
    pub classifier_timeout: Duration,
}

impl DispatcherConfig {
    pub fn from_settings(dialog: &DialogConfig, classifier: &ClassifierConfig) -> Self {
        Self {
            fallback_intent: dialog.fallback_intent.clone(),
            min_confidence: dialog.min_confidence,
            limits: RuntimeLimits::from_config(dialog),
            classifier_timeout: Duration::from_millis(classifier.timeout_ms),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            fallback_intent: defaults::FALLBACK_INTENT.to_string(),
            min_confidence: 0.0,
            limits: RuntimeLimits::default(),
            classifier_timeout: Duration::from_millis(classifier_defaults::TIMEOUT_MS),
        }
    }
}

/// How a turn finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Steps ran and state was persisted
    Completed,
    /// The answer did not satisfy the pending prompt; it was asked again
    Reprompted,
    /// Classification failed; nothing was sent or stored
    Abandoned,
    /// The conversation ended during this turn
    ConversationEnded,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Reprompted => "reprompted",
            Self::Abandoned => "abandoned",
            Self::ConversationEnded => "conversation_ended",
        }
    }
}

/// Summary of a handled turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Stack depth after the turn
    pub depth: usize,
    /// Active dialog after the turn
    pub top_dialog: String,
    pub messages_sent: usize,
    /// Best intent, when the utterance was classified
    pub intent: Option<String>,
}

/// Async locks keyed by conversation or user ID
#[derive(Default)]
struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        // Exists before the wait so a cancelled waiter also releases
        let mut held = KeyedGuard {
            locks: self,
            key: key.to_string(),
            guard: None,
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Forget the lock once nobody holds or waits for it
    fn release(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Held lock, released and forgotten on drop even if the turn is cancelled
struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.key);
    }
}

/// What the turn does with the utterance
enum Route {
    Answer(PendingPrompt, PromptAnswer),
    Reprompt(PendingPrompt),
    Classify,
}

/// Routes inbound messages through the dialog stacks
pub struct TurnDispatcher {
    registry: Arc<DialogRegistry>,
    classifier: Arc<dyn IntentClassifier>,
    store: Arc<dyn StateStore>,
    channel: Arc<dyn OutputChannel>,
    config: DispatcherConfig,
    conversations: KeyedLocks,
    users: KeyedLocks,
}

impl TurnDispatcher {
    pub fn new(
        registry: Arc<DialogRegistry>,
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<dyn StateStore>,
        channel: Arc<dyn OutputChannel>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            store,
            channel,
            config,
            conversations: KeyedLocks::default(),
            users: KeyedLocks::default(),
        }
    }

    pub fn registry(&self) -> &Arc<DialogRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Conversations with a turn in flight or queued
    pub fn active_conversations(&self) -> usize {
        self.conversations.len()
    }

    /// Handle one inbound message
    pub async fn handle(&self, activity: &Activity) -> Result<TurnReport, DialogError> {
        let span = tracing::info_span!(
            "turn",
            conversation_id = %activity.conversation_id,
            user_id = %activity.user_id,
        );

        let conversation = self.conversations.lock(&activity.conversation_id).await;
        let user = self.users.lock(&activity.user_id).await;
        let result = self.process(activity).instrument(span).await;
        drop(user);
        drop(conversation);

        match &result {
            Ok(report) => metrics::record_turn(report.outcome.as_str()),
            Err(e) => metrics::record_error(error_kind(e)),
        }
        result
    }

    /// Load the stored state of a conversation
    pub async fn conversation_state(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationState, DialogError> {
        let bag = self.store.get(StateScope::DialogStack, conversation_id).await?;
        ConversationState::from_bag(bag, self.registry.root())
    }

    /// End a conversation from outside a turn
    pub async fn end_conversation(&self, conversation_id: &str) -> Result<(), DialogError> {
        let _guard = self.conversations.lock(conversation_id).await;
        let mut state = self.conversation_state(conversation_id).await?;
        state.reset();
        state.touch();
        self.store
            .commit(vec![
                StateWrite::new(StateScope::DialogStack, conversation_id, state.to_bag()?),
                StateWrite::new(StateScope::Conversation, conversation_id, StateBag::new()),
            ])
            .await?;
        tracing::info!(conversation_id, "Conversation ended externally");
        Ok(())
    }

    async fn process(&self, activity: &Activity) -> Result<TurnReport, DialogError> {
        let conversation_id = activity.conversation_id.as_str();
        let user_id = activity.user_id.as_str();
        let text = activity.text.as_str();

        let stored = self.store.get(StateScope::DialogStack, conversation_id).await?;
        let mut state = ConversationState::from_bag(stored, self.registry.root())?;

        let route = match state.pending_prompt.take() {
            Some(pending) if self.prompt_is_current(&pending, &state) => {
                match PromptEngine::validate(&pending.kind, text) {
                    Some(answer) => Route::Answer(pending, answer),
                    None => Route::Reprompt(pending),
                }
            }
            Some(stale) => {
                tracing::warn!(
                    dialog = %stale.dialog,
                    depth = stale.depth,
                    "Discarding prompt that no longer matches the stack"
                );
                state.stack.top_mut().awaiting_prompt = false;
                Route::Classify
            }
            None => Route::Classify,
        };

        let classification = match route {
            Route::Classify => match self.classify(text).await {
                Ok(result) => Some(result),
                Err(e) => {
                    metrics::record_classifier_failure(self.classifier.name());
                    tracing::warn!(
                        classifier = self.classifier.name(),
                        error = %e,
                        "Classification failed, abandoning turn"
                    );
                    return Ok(TurnReport {
                        outcome: TurnOutcome::Abandoned,
                        depth: state.stack.depth(),
                        top_dialog: state.stack.top().dialog.clone(),
                        messages_sent: 0,
                        intent: None,
                    });
                }
            },
            _ => None,
        };

        let mut conversation_data = self.store.get(StateScope::Conversation, conversation_id).await?;
        let mut user_data = self.store.get(StateScope::User, user_id).await?;
        let user_loaded = user_data.clone();
        let mut outbox: Vec<OutboundMessage> = Vec::new();

        let mut reprompted = false;
        let (result, ended) = {
            let mut rt = DialogRuntime::new(
                &self.registry,
                self.config.limits,
                &mut state,
                &mut conversation_data,
                &mut user_data,
                &mut outbox,
                conversation_id,
                user_id,
                text,
            );

            let result = match &route {
                Route::Answer(pending, answer) => {
                    if let PromptPurpose::ConfirmInterruption { intent, .. } = &pending.purpose {
                        rt.set_intent(Some(intent));
                    }
                    self.answer(&mut rt, pending, answer.clone())
                }
                Route::Reprompt(_) => Ok(()),
                Route::Classify => match &classification {
                    Some(intent) => {
                        rt.set_intent(Some(intent));
                        self.route(&mut rt, intent, text)
                    }
                    None => Ok(()),
                },
            };
            (result, rt.conversation_ended())
        };

        if let Route::Reprompt(pending) = route {
            tracing::debug!(
                dialog = %pending.dialog,
                kind = pending.kind.as_str(),
                "Answer did not satisfy prompt, asking again"
            );
            metrics::record_reprompt(pending.kind.as_str());
            outbox.push(PromptEngine::render_pending(&pending));
            state.pending_prompt = Some(pending);
            reprompted = true;
        }

        // Unchanged user data is not written back
        let user_update = (user_data != user_loaded).then_some(user_data);

        let intent = classification
            .as_ref()
            .and_then(|r| r.best())
            .map(|i| i.intent.clone());

        match result {
            Ok(()) => {
                let messages_sent = self.flush(conversation_id, outbox).await;
                self.persist(conversation_id, user_id, &mut state, conversation_data, user_update)
                    .await?;

                let outcome = if ended {
                    TurnOutcome::ConversationEnded
                } else if reprompted {
                    TurnOutcome::Reprompted
                } else {
                    TurnOutcome::Completed
                };
                tracing::info!(
                    outcome = outcome.as_str(),
                    intent = intent.as_deref().unwrap_or("-"),
                    depth = state.stack.depth(),
                    dialog = %state.stack.top().dialog,
                    messages = messages_sent,
                    "Turn handled"
                );

                Ok(TurnReport {
                    outcome,
                    depth: state.stack.depth(),
                    top_dialog: state.stack.top().dialog.clone(),
                    messages_sent,
                    intent,
                })
            }
            Err(e) if e.ends_conversation() => {
                tracing::error!(error = %e, stack = ?state.stack.names(), "Ending conversation");
                state.reset();
                conversation_data.clear();
                self.flush(conversation_id, outbox).await;
                self.persist(conversation_id, user_id, &mut state, conversation_data, user_update)
                    .await?;
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "Turn aborted, state not persisted");
                self.flush(conversation_id, outbox).await;
                Err(e)
            }
        }
    }

    fn prompt_is_current(&self, pending: &PendingPrompt, state: &ConversationState) -> bool {
        let top = state.stack.top();
        let position_ok = pending.depth == state.stack.depth() && pending.dialog == top.dialog;
        match pending.purpose {
            PromptPurpose::Step => position_ok && top.awaiting_prompt,
            PromptPurpose::ConfirmInterruption { .. } => position_ok,
        }
    }

    async fn classify(&self, text: &str) -> Result<IntentResult, ClassifierError> {
        let timeout = self.config.classifier_timeout;
        match tokio::time::timeout(timeout, self.classifier.classify(text)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(timeout.as_millis() as u64)),
        }
    }

    fn answer(
        &self,
        rt: &mut DialogRuntime<'_>,
        pending: &PendingPrompt,
        answer: PromptAnswer,
    ) -> Result<(), DialogError> {
        match &pending.purpose {
            PromptPurpose::Step => rt.resume_current(StepArgs::Answer(answer)),
            PromptPurpose::ConfirmInterruption {
                target,
                intent,
                original_input,
            } => {
                if answer == PromptAnswer::Confirm(true) {
                    metrics::record_interruption("confirmed");
                    tracing::debug!(target = %target, "Interruption confirmed");
                    rt.begin_triggered(target, StepArgs::Intent(intent.clone()))
                } else {
                    metrics::record_interruption("declined");
                    tracing::debug!(dialog = %pending.dialog, "Interruption declined, resuming");
                    rt.resume_current(StepArgs::Message(original_input.clone()))
                }
            }
        }
    }

    fn route(
        &self,
        rt: &mut DialogRuntime<'_>,
        result: &IntentResult,
        text: &str,
    ) -> Result<(), DialogError> {
        let best = result
            .best_above(self.config.min_confidence)
            .filter(|best| best.intent != self.config.fallback_intent);

        let Some(best) = best else {
            return self.begin_fallback(rt, result);
        };

        let Some(target) = self.registry.trigger_for(best) else {
            // Known intent, but nothing listens for it
            return if rt.is_root_only() {
                self.begin_fallback(rt, result)
            } else {
                rt.resume_current(StepArgs::Message(text.to_string()))
            };
        };

        if target.name() == rt.top_dialog() {
            return rt.resume_current(StepArgs::Message(text.to_string()));
        }

        let interruption = Interruption {
            target: target.name().to_string(),
            intent: best.clone(),
        };
        self.interrupt(rt, &interruption, result, text)
    }

    fn interrupt(
        &self,
        rt: &mut DialogRuntime<'_>,
        interruption: &Interruption,
        result: &IntentResult,
        text: &str,
    ) -> Result<(), DialogError> {
        let from_root = rt.is_root_only();
        let target = interruption.target.as_str();

        match rt.consult_hook(interruption)? {
            Some(InterruptDecision::Suppress) => {
                metrics::record_interruption("suppressed");
                tracing::debug!(dialog = %rt.top_dialog(), target, "Interruption suppressed");
                rt.resume_current(StepArgs::Message(text.to_string()))
            }
            Some(InterruptDecision::Allow) => {
                metrics::record_interruption("allowed");
                rt.begin_triggered(target, StepArgs::Intent(result.clone()))
            }
            None => match rt.confirm_prompt_of_top()? {
                Some(question) => {
                    metrics::record_interruption("deferred");
                    tracing::debug!(dialog = %rt.top_dialog(), target, "Asking before interrupting");
                    rt.defer_interruption(&question, target, result.clone(), text);
                    Ok(())
                }
                None => {
                    if !from_root {
                        metrics::record_interruption("immediate");
                    }
                    rt.begin_triggered(target, StepArgs::Intent(result.clone()))
                }
            },
        }
    }

    /// Begin the fallback dialog, nesting it again if it is already on top
    fn begin_fallback(
        &self,
        rt: &mut DialogRuntime<'_>,
        result: &IntentResult,
    ) -> Result<(), DialogError> {
        let fallback = self.registry.fallback();
        tracing::debug!(
            intent = result.best().map(|i| i.intent.as_str()).unwrap_or("-"),
            "No trigger matched, beginning fallback"
        );
        rt.begin(fallback, StepArgs::Intent(result.clone()))
    }

    async fn flush(&self, conversation_id: &str, outbox: Vec<OutboundMessage>) -> usize {
        let count = outbox.len();
        for message in outbox {
            self.channel.send(conversation_id, message).await;
        }
        count
    }

    async fn persist(
        &self,
        conversation_id: &str,
        user_id: &str,
        state: &mut ConversationState,
        conversation_data: StateBag,
        user_data: Option<StateBag>,
    ) -> Result<(), DialogError> {
        state.touch();
        let mut writes = vec![
            StateWrite::new(StateScope::DialogStack, conversation_id, state.to_bag()?),
            StateWrite::new(StateScope::Conversation, conversation_id, conversation_data),
        ];
        if let Some(user_data) = user_data {
            writes.push(StateWrite::new(StateScope::User, user_id, user_data));
        }
        self.store.commit(writes).await?;
        Ok(())
    }
}

fn error_kind(err: &DialogError) -> &'static str {
    match err {
        DialogError::UnknownDialog(_) => "unknown_dialog",
        DialogError::DuplicateName(_) => "duplicate_name",
        DialogError::ConflictingTrigger { .. } => "conflicting_trigger",
        DialogError::StackOverflow(_) => "stack_overflow",
        DialogError::RunawayTurn(_) => "runaway_turn",
        DialogError::Store(_) => "store",
        DialogError::State(_) => "state",
    }
}
