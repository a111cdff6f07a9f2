//! Integration tests for the turn dispatcher
//!
//! Drives full turns (classify -> route -> steps -> flush -> commit) against
//! a scripted classifier, an in-memory store and the recording channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Barrier;

use supportbot_core::{
    Activity, ClassifierError, IntentClassifier, IntentResult, MemoryChannel, OutboundMessage,
    RankedIntent, StateBag, StateScope, StateStore, StateWrite, StoreError,
};
use supportbot_dialog::{
    ConversationState, DialogDefinition, DialogError, DialogInstance, DialogRegistry,
    DispatcherConfig, InterruptDecision, PendingPrompt, Prompt, PromptEngine, PromptKind,
    PromptPurpose, RuntimeLimits, StepArgs, StepOutcome, TriggerConfig, TurnDispatcher,
    TurnOutcome, TurnReport,
};

/// Classifier answering from a phrase table
#[derive(Default)]
struct ScriptedClassifier {
    script: HashMap<String, &'static str>,
    failing: AtomicBool,
    barrier: Option<Arc<Barrier>>,
    delay: Option<Duration>,
}

impl ScriptedClassifier {
    fn new(entries: &[(&str, &'static str)]) -> Self {
        Self {
            script: entries
                .iter()
                .map(|(phrase, intent)| (phrase.to_string(), *intent))
                .collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, utterance: &str) -> Result<IntentResult, ClassifierError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        } else if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClassifierError::Transport("connection reset".into()));
        }
        let intent = self
            .script
            .get(&utterance.to_lowercase())
            .copied()
            .unwrap_or("None");
        Ok(IntentResult::new(utterance, vec![RankedIntent::new(intent, 0.9)]))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Transactional store: a commit applies every write or none of them
#[derive(Default)]
struct TestStore {
    bags: Mutex<HashMap<(&'static str, String), StateBag>>,
    /// Bag writes accepted before commits start failing
    write_budget: Mutex<Option<usize>>,
    commit_delay: Mutex<Option<Duration>>,
}

impl TestStore {
    fn snapshot(&self) -> HashMap<(&'static str, String), StateBag> {
        self.bags.lock().clone()
    }

    fn fail_after_writes(&self, writes: Option<usize>) {
        *self.write_budget.lock() = writes;
    }

    fn delay_commits(&self, delay: Duration) {
        *self.commit_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl StateStore for TestStore {
    async fn get(&self, scope: StateScope, id: &str) -> Result<StateBag, StoreError> {
        tokio::task::yield_now().await;
        Ok(self
            .bags
            .lock()
            .get(&(scope.as_str(), id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set(&self, scope: StateScope, id: &str, bag: StateBag) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.bags.lock().insert((scope.as_str(), id.to_string()), bag);
        Ok(())
    }

    async fn commit(&self, writes: Vec<StateWrite>) -> Result<(), StoreError> {
        let delay = *self.commit_delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let mut staged = self.bags.lock().clone();
        let mut budget = self.write_budget.lock();
        for write in writes {
            if let Some(left) = budget.as_mut() {
                if *left == 0 {
                    return Err(StoreError::Backend("write refused".into()));
                }
                *left -= 1;
            }
            staged.insert((write.scope.as_str(), write.id), write.bag);
        }
        *self.bags.lock() = staged;
        Ok(())
    }

    async fn delete(&self, scope: StateScope, id: &str) -> Result<(), StoreError> {
        self.bags.lock().remove(&(scope.as_str(), id.to_string()));
        Ok(())
    }

    fn backend(&self) -> &str {
        "test"
    }
}

const SCRIPT: &[(&str, &str)] = &[
    ("hello", "Greet"),
    ("hi", "Greet"),
    ("book a webinar", "BookWebinar"),
    ("quiz", "Quiz"),
    ("parent", "Parent"),
    ("loop", "Loop"),
    ("count", "Count"),
    ("tally", "Tally"),
    ("bye", "EndConversation"),
    ("nothing listens", "Orphan"),
];

fn registry() -> DialogRegistry {
    let mut builder = DialogRegistry::builder();
    builder
        .register(
            DialogDefinition::new("GreetingDialog")
                .step(|ctx, _| {
                    ctx.conversation_data.set("greetDone", true);
                    StepOutcome::Suspend(Prompt::choice_str(
                        "How can I help?",
                        "Book a Webinar|My Assessments",
                    ))
                })
                .step(|ctx, args| {
                    let choice = args.answer().cloned().map(|a| a.into_value());
                    ctx.send_text(format!("You chose {}", choice.unwrap_or(json!(null))));
                    StepOutcome::Pop(None)
                })
                .trigger(TriggerConfig::new("Greet")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("NoneDialog")
                .step(|_, _| {
                    StepOutcome::Suspend(Prompt::choice_str(
                        "Sorry, I didn't get that. What would you like to do?",
                        "Book a Webinar|Contact Support",
                    ))
                })
                .step(|_, args| StepOutcome::Pop(args.into_result()))
                .trigger(TriggerConfig::new("None")),
        )
        .unwrap()
        .register(
            // Stays on its first step until it hears a weekday
            DialogDefinition::new("BookWebinarDialog")
                .step(|ctx, args| match args {
                    StepArgs::Message(m) if m.ends_with("day") => {
                        ctx.send_text(format!("Booked for {}", m));
                        StepOutcome::Pop(None)
                    }
                    _ => {
                        ctx.send_text("Which day works for you?");
                        StepOutcome::Done
                    }
                })
                .trigger(TriggerConfig::new("BookWebinar")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("QuizDialog")
                .step(|ctx, args| {
                    if let StepArgs::Message(m) = args {
                        ctx.send_text(format!("quiz heard {}", m));
                    }
                    StepOutcome::Done
                })
                .trigger(TriggerConfig::new("Quiz").on_interrupted(|_, interruption| {
                    if interruption.intent.intent == "EndConversation" {
                        InterruptDecision::Allow
                    } else {
                        InterruptDecision::Suppress
                    }
                })),
        )
        .unwrap()
        .register(
            DialogDefinition::new("ParentDialog")
                .step(|_, _| StepOutcome::push("ChildDialog"))
                .step(|ctx, args| {
                    let seen = ctx.conversation_data.get_as::<u32>("responses").unwrap_or(0);
                    ctx.conversation_data.set("responses", seen + 1);
                    if let Some(value) = args.response() {
                        ctx.conversation_data.set("child", value.clone());
                    }
                    StepOutcome::Done
                })
                .trigger(TriggerConfig::new("Parent")),
        )
        .unwrap()
        .register(DialogDefinition::new("ChildDialog").step(|_, _| StepOutcome::pop_with("v")))
        .unwrap()
        .register(
            DialogDefinition::new("LoopDialog")
                .step(|ctx, _| {
                    ctx.conversation_data.set("looping", true);
                    StepOutcome::push("LoopDialog")
                })
                .trigger(TriggerConfig::new("Loop")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("CountDialog")
                .step(|ctx, _| {
                    let count = ctx.conversation_data.get_as::<u32>("count").unwrap_or(0);
                    ctx.conversation_data.set("count", count + 1);
                    StepOutcome::Pop(None)
                })
                .trigger(TriggerConfig::new("Count")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("TallyDialog")
                .step(|ctx, _| {
                    let count = ctx.user_data.get_as::<u32>("tally").unwrap_or(0);
                    ctx.user_data.set("tally", count + 1);
                    StepOutcome::Pop(None)
                })
                .trigger(TriggerConfig::new("Tally")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("EndConversationDialog")
                .step(|ctx, _| {
                    ctx.send_text("Goodbye");
                    StepOutcome::EndConversation
                })
                .trigger(TriggerConfig::new("EndConversation").clear_stack()),
        )
        .unwrap();
    builder.build().unwrap()
}

struct Harness {
    dispatcher: Arc<TurnDispatcher>,
    classifier: Arc<ScriptedClassifier>,
    store: Arc<TestStore>,
    channel: Arc<MemoryChannel>,
}

impl Harness {
    fn new() -> Self {
        Self::build(registry(), ScriptedClassifier::new(SCRIPT), DispatcherConfig::default())
    }

    fn build(
        registry: DialogRegistry,
        classifier: ScriptedClassifier,
        config: DispatcherConfig,
    ) -> Self {
        let classifier = Arc::new(classifier);
        let store = Arc::new(TestStore::default());
        let channel = Arc::new(MemoryChannel::new());
        let dispatcher = Arc::new(TurnDispatcher::new(
            Arc::new(registry),
            classifier.clone(),
            store.clone(),
            channel.clone(),
            config,
        ));
        Self {
            dispatcher,
            classifier,
            store,
            channel,
        }
    }

    async fn say(&self, text: &str) -> Result<TurnReport, DialogError> {
        self.dispatcher
            .handle(&Activity::message("c1", "u1", text))
            .await
    }

    async fn stack(&self) -> Vec<String> {
        let state = self.dispatcher.conversation_state("c1").await.unwrap();
        state.stack.names().into_iter().map(String::from).collect()
    }

    async fn conversation_data(&self) -> StateBag {
        self.store.get(StateScope::Conversation, "c1").await.unwrap()
    }
}

/// Greet at root begins the greeting and asks a choice; a non-answer re-asks
#[tokio::test]
async fn test_greeting_then_invalid_answer_reprompts() {
    let h = Harness::new();

    let report = h.say("hello").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(report.intent.as_deref(), Some("Greet"));
    assert_eq!(report.depth, 2);
    assert_eq!(report.top_dialog, "GreetingDialog");
    assert!(h.conversation_data().await.flag("greetDone"));

    let first = h.channel.drain("c1");
    assert_eq!(first.len(), 1);
    assert!(matches!(&first[0], OutboundMessage::ChoicePrompt { options, .. } if options.len() == 2));

    let report = h.say("the weather").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::Reprompted);
    assert_eq!(h.stack().await, vec!["RootDialog", "GreetingDialog"]);
    assert_eq!(h.channel.drain("c1"), first);

    // Ordinal answer now resolves the prompt
    h.say("2").await.unwrap();
    assert_eq!(h.channel.texts("c1"), vec!["You chose \"My Assessments\""]);
    assert_eq!(h.stack().await, vec!["RootDialog"]);
}

#[tokio::test]
async fn test_none_over_active_dialog_pushes_fallback() {
    let h = Harness::new();
    h.say("book a webinar").await.unwrap();
    assert_eq!(h.stack().await.len(), 2);

    let report = h.say("gibberish").await.unwrap();
    assert_eq!(report.depth, 3);
    assert_eq!(
        h.stack().await,
        vec!["RootDialog", "BookWebinarDialog", "NoneDialog"]
    );
}

#[tokio::test]
async fn test_unmatched_message_goes_to_active_step() {
    let h = Harness::new();
    h.say("book a webinar").await.unwrap();

    // Orphan scores high but no dialog listens for it
    h.say("nothing listens").await.unwrap();
    assert_eq!(h.stack().await, vec!["RootDialog", "BookWebinarDialog"]);

    // No intent at all begins the fallback over it
    h.say("Tuesday").await.unwrap();
    assert_eq!(h.stack().await.last().map(String::as_str), Some("NoneDialog"));
}

#[tokio::test]
async fn test_interruption_without_hook_pushes_dialog() {
    let h = Harness::new();
    h.say("book a webinar").await.unwrap();
    let before = h.stack().await.len();

    h.say("hello").await.unwrap();
    let stack = h.stack().await;
    assert_eq!(stack.len(), before + 1);
    assert_eq!(stack.last().map(String::as_str), Some("GreetingDialog"));
}

#[tokio::test]
async fn test_declined_interruption_leaves_stack_unchanged() {
    let mut builder = DialogRegistry::builder();
    builder
        .register(
            DialogDefinition::new("NoneDialog")
                .step(|_, _| StepOutcome::Pop(None))
                .trigger(TriggerConfig::new("None")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("GreetingDialog")
                .step(|ctx, _| {
                    ctx.send_text("Hi there");
                    StepOutcome::Pop(None)
                })
                .trigger(TriggerConfig::new("Greet")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("BookWebinarDialog")
                .step(|ctx, args| {
                    if let StepArgs::Message(m) = args {
                        ctx.send_text(format!("still booking, heard {}", m));
                    }
                    StepOutcome::Done
                })
                .trigger(
                    TriggerConfig::new("BookWebinar")
                        .confirm_prompt("Do you want to cancel the current task?"),
                ),
        )
        .unwrap();
    let h = Harness::build(
        builder.build().unwrap(),
        ScriptedClassifier::new(SCRIPT),
        DispatcherConfig::default(),
    );

    h.say("book a webinar").await.unwrap();
    let before = h.dispatcher.conversation_state("c1").await.unwrap();
    h.channel.drain("c1");

    h.say("hello").await.unwrap();
    assert_eq!(
        h.channel.drain("c1"),
        vec![OutboundMessage::ConfirmPrompt {
            text: "Do you want to cancel the current task?".into()
        }]
    );

    let report = h.say("no").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::Completed);
    let after = h.dispatcher.conversation_state("c1").await.unwrap();
    assert_eq!(after.stack, before.stack);
    assert!(after.pending_prompt.is_none());
    assert_eq!(h.channel.texts("c1"), vec!["still booking, heard hello"]);
}

#[tokio::test]
async fn test_confirmed_interruption_begins_target() {
    let mut builder = DialogRegistry::builder();
    builder
        .register(
            DialogDefinition::new("NoneDialog")
                .step(|_, _| StepOutcome::Pop(None))
                .trigger(TriggerConfig::new("None")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("GreetingDialog")
                .step(|ctx, args| {
                    if let StepArgs::Intent(intent) = args {
                        ctx.send_text(format!("greeting for {}", intent.query));
                    }
                    StepOutcome::Done
                })
                .trigger(TriggerConfig::new("Greet")),
        )
        .unwrap()
        .register(
            DialogDefinition::new("BookWebinarDialog")
                .step(|_, _| StepOutcome::Done)
                .trigger(TriggerConfig::new("BookWebinar").confirm_prompt("Leave booking?")),
        )
        .unwrap();
    let h = Harness::build(
        builder.build().unwrap(),
        ScriptedClassifier::new(SCRIPT),
        DispatcherConfig::default(),
    );

    h.say("book a webinar").await.unwrap();
    h.say("hello").await.unwrap();
    // Not yes or no: ask again
    assert_eq!(h.say("maybe").await.unwrap().outcome, TurnOutcome::Reprompted);

    h.say("yes").await.unwrap();
    assert_eq!(
        h.stack().await,
        vec!["RootDialog", "BookWebinarDialog", "GreetingDialog"]
    );
    assert_eq!(h.channel.texts("c1").last().map(String::as_str), Some("greeting for hello"));
}

#[tokio::test]
async fn test_hook_suppresses_interruption() {
    let h = Harness::new();
    h.say("quiz").await.unwrap();

    h.say("hello").await.unwrap();
    assert_eq!(h.stack().await, vec!["RootDialog", "QuizDialog"]);
    assert_eq!(h.channel.texts("c1"), vec!["quiz heard hello"]);

    // The hook lets this one through; clear_stack unwinds first
    let report = h.say("bye").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::ConversationEnded);
    assert_eq!(h.stack().await, vec!["RootDialog"]);
}

#[tokio::test]
async fn test_child_result_resumes_parent_once() {
    let h = Harness::new();
    h.say("parent").await.unwrap();

    let data = h.conversation_data().await;
    assert_eq!(data.get_as::<u32>("responses"), Some(1));
    assert_eq!(data.get_str("child"), Some("v"));
    assert_eq!(h.stack().await, vec!["RootDialog", "ParentDialog"]);
}

#[tokio::test]
async fn test_stack_never_empty() {
    let h = Harness::new();
    for text in [
        "hello", "1", "bye", "book a webinar", "gibberish", "2", "parent", "Friday", "bye",
        "quiz", "count", "bye", "bye",
    ] {
        let _ = h.say(text).await;
        let stack = h.stack().await;
        assert!(!stack.is_empty(), "empty stack after {text:?}");
        assert_eq!(stack[0], "RootDialog");
    }
}

#[tokio::test]
async fn test_end_conversation_clears_conversation_data() {
    let h = Harness::new();
    h.say("hello").await.unwrap();
    assert!(h.conversation_data().await.flag("greetDone"));

    // Pending choice prompt: "bye" is not an option and is re-asked
    assert_eq!(h.say("bye").await.unwrap().outcome, TurnOutcome::Reprompted);
    h.say("1").await.unwrap();

    let report = h.say("bye").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::ConversationEnded);
    assert!(h.conversation_data().await.is_empty());
}

#[tokio::test]
async fn test_classifier_failure_changes_nothing() {
    let h = Harness::new();
    h.say("book a webinar").await.unwrap();
    h.channel.drain("c1");
    let snapshot = h.store.snapshot();

    h.classifier.failing.store(true, Ordering::SeqCst);
    let report = h.say("hello").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Abandoned);
    assert_eq!(report.depth, 2);
    assert_eq!(h.channel.total(), 0);
    assert_eq!(h.store.snapshot(), snapshot);
}

#[tokio::test]
async fn test_classifier_timeout_abandons_turn() {
    struct Slow;

    #[async_trait]
    impl IntentClassifier for Slow {
        async fn classify(&self, utterance: &str) -> Result<IntentResult, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(IntentResult::new(utterance, vec![]))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    let store = Arc::new(TestStore::default());
    let channel = Arc::new(MemoryChannel::new());
    let dispatcher = TurnDispatcher::new(
        Arc::new(registry()),
        Arc::new(Slow),
        store.clone(),
        channel.clone(),
        DispatcherConfig {
            classifier_timeout: Duration::from_millis(20),
            ..DispatcherConfig::default()
        },
    );

    let report = dispatcher
        .handle(&Activity::message("c1", "u1", "hello"))
        .await
        .unwrap();
    assert_eq!(report.outcome, TurnOutcome::Abandoned);
    assert!(store.snapshot().is_empty());
    assert_eq!(channel.total(), 0);
}

#[tokio::test]
async fn test_stack_overflow_resets_conversation() {
    let h = Harness::build(
        registry(),
        ScriptedClassifier::new(SCRIPT),
        DispatcherConfig {
            limits: RuntimeLimits {
                max_stack_depth: 4,
                ..RuntimeLimits::default()
            },
            ..DispatcherConfig::default()
        },
    );
    h.say("hello").await.unwrap();
    h.say("1").await.unwrap();
    assert!(h.conversation_data().await.flag("greetDone"));

    let err = h.say("loop").await.unwrap_err();
    assert!(matches!(err, DialogError::StackOverflow(4)));
    assert_eq!(h.stack().await, vec!["RootDialog"]);
    assert!(h.conversation_data().await.is_empty());

    // The conversation carries on afterwards
    assert_eq!(h.say("hello").await.unwrap().depth, 2);
}

#[tokio::test]
async fn test_runaway_turn_is_stopped() {
    let mut builder = DialogRegistry::builder();
    builder
        .register(
            DialogDefinition::new("NoneDialog")
                .step(|_, _| StepOutcome::Advance)
                .step(|_, _| StepOutcome::replace("NoneDialog"))
                .trigger(TriggerConfig::new("None")),
        )
        .unwrap();
    let h = Harness::build(
        builder.build().unwrap(),
        ScriptedClassifier::new(SCRIPT),
        DispatcherConfig::default(),
    );

    let err = h.say("anything").await.unwrap_err();
    assert!(matches!(err, DialogError::RunawayTurn(_)));
    assert_eq!(h.stack().await, vec!["RootDialog"]);
}

#[tokio::test]
async fn test_unknown_dialog_is_not_persisted() {
    let mut builder = DialogRegistry::builder();
    builder
        .register(
            DialogDefinition::new("NoneDialog")
                .step(|ctx, _| {
                    ctx.send_text("about to fail");
                    StepOutcome::push("Missing")
                })
                .trigger(TriggerConfig::new("None")),
        )
        .unwrap();
    let h = Harness::build(
        builder.build().unwrap(),
        ScriptedClassifier::new(SCRIPT),
        DispatcherConfig::default(),
    );

    let err = h.say("anything").await.unwrap_err();
    assert!(matches!(err, DialogError::UnknownDialog(name) if name == "Missing"));
    // Queued output is still delivered
    assert_eq!(h.channel.texts("c1"), vec!["about to fail"]);
    assert!(h.store.snapshot().is_empty());
}

#[test]
fn test_newest_prompt_wins() {
    let prompt = |text: &str, kind: PromptKind| PendingPrompt {
        kind,
        text: text.into(),
        dialog: "GreetingDialog".into(),
        depth: 2,
        resume_step: 1,
        purpose: PromptPurpose::Step,
    };

    let mut slot = None;
    let first = prompt(
        "Pick one",
        PromptKind::Choice {
            options: vec!["red".into(), "blue".into()],
            list_style: Default::default(),
        },
    );
    assert!(PromptEngine::issue(&mut slot, first.clone()).is_none());
    let replaced = PromptEngine::issue(&mut slot, prompt("Sure?", PromptKind::Confirm));
    assert_eq!(replaced, Some(first));

    let pending = slot.unwrap();
    assert!(PromptEngine::validate(&pending.kind, "red").is_none());
    assert!(PromptEngine::validate(&pending.kind, "yes").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_conversation_turns_are_serialized() {
    let h = Harness::new();
    let turns = (0..8).map(|_| {
        let dispatcher = Arc::clone(&h.dispatcher);
        tokio::spawn(async move {
            dispatcher
                .handle(&Activity::message("c1", "u1", "count"))
                .await
        })
    });
    for result in futures::future::join_all(turns).await {
        result.unwrap().unwrap();
    }

    assert_eq!(h.conversation_data().await.get_as::<u32>("count"), Some(8));
    let state = h.dispatcher.conversation_state("c1").await.unwrap();
    assert_eq!(state.turn_count, 8);
    assert_eq!(h.dispatcher.active_conversations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_different_conversations_run_independently() {
    // Both classifications must be in flight at once to pass the barrier
    let classifier = ScriptedClassifier {
        barrier: Some(Arc::new(Barrier::new(2))),
        ..ScriptedClassifier::new(SCRIPT)
    };
    let h = Harness::build(registry(), classifier, DispatcherConfig::default());

    let first = Activity::message("a", "u1", "hello");
    let second = Activity::message("b", "u2", "hello");
    let a = h.dispatcher.handle(&first);
    let b = h.dispatcher.handle(&second);
    let (a, b) = tokio::time::timeout(Duration::from_secs(2), futures::future::join(a, b))
        .await
        .expect("turns for different conversations blocked each other");

    assert_eq!(a.unwrap().depth, 2);
    assert_eq!(b.unwrap().depth, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_user_turns_across_conversations_are_serialized() {
    let h = Harness::new();
    // Both turns would read the user bag before either writes it back
    h.store.delay_commits(Duration::from_millis(50));

    let first = Activity::message("a", "u1", "tally");
    let second = Activity::message("b", "u1", "tally");
    let (a, b) = futures::future::join(h.dispatcher.handle(&first), h.dispatcher.handle(&second)).await;
    a.unwrap();
    b.unwrap();

    let user = h.store.get(StateScope::User, "u1").await.unwrap();
    assert_eq!(user.get_as::<u32>("tally"), Some(2));
    assert_eq!(h.dispatcher.active_conversations(), 0);
}

#[tokio::test]
async fn test_fallback_nests_when_already_on_top() {
    let mut builder = DialogRegistry::builder();
    builder
        .register(
            DialogDefinition::new("NoneDialog")
                .step(|ctx, _| {
                    ctx.send_text("Sorry?");
                    StepOutcome::Done
                })
                .trigger(TriggerConfig::new("None")),
        )
        .unwrap();
    let h = Harness::build(
        builder.build().unwrap(),
        ScriptedClassifier::new(SCRIPT),
        DispatcherConfig::default(),
    );

    assert_eq!(h.say("gibberish").await.unwrap().depth, 2);
    let report = h.say("more gibberish").await.unwrap();
    assert_eq!(report.depth, 3);
    assert_eq!(h.stack().await, vec!["RootDialog", "NoneDialog", "NoneDialog"]);
    assert_eq!(h.channel.texts("c1"), vec!["Sorry?", "Sorry?"]);
}

#[tokio::test]
async fn test_failed_commit_keeps_previous_turn_state() {
    let h = Harness::new();
    h.say("book a webinar").await.unwrap();
    let before = h.store.snapshot();

    // The dialog stack write is accepted, the conversation data write is not
    h.store.fail_after_writes(Some(1));
    let err = h.say("hello").await.unwrap_err();
    assert!(matches!(err, DialogError::Store(_)));
    assert_eq!(h.store.snapshot(), before);
    assert_eq!(h.stack().await, vec!["RootDialog", "BookWebinarDialog"]);
    assert!(!h.conversation_data().await.flag("greetDone"));

    h.store.fail_after_writes(None);
    let report = h.say("hello").await.unwrap();
    assert_eq!(report.top_dialog, "GreetingDialog");
    assert!(h.conversation_data().await.flag("greetDone"));
}

#[tokio::test]
async fn test_stale_prompt_is_replaced_by_newest() {
    let h = Harness::new();

    // A choice prompt left behind by a dialog that is no longer on the stack
    let mut state = ConversationState::new(h.dispatcher.registry().root());
    state.stack.push(DialogInstance::new("BookWebinarDialog"));
    state.pending_prompt = Some(PendingPrompt {
        kind: PromptKind::Choice {
            options: vec!["red".into(), "blue".into()],
            list_style: Default::default(),
        },
        text: "Pick one".into(),
        dialog: "QuizDialog".into(),
        depth: 3,
        resume_step: 1,
        purpose: PromptPurpose::Step,
    });
    h.store
        .set(StateScope::DialogStack, "c1", state.to_bag().unwrap())
        .await
        .unwrap();

    let report = h.say("hello").await.unwrap();
    assert_eq!(report.intent.as_deref(), Some("Greet"));
    assert_eq!(report.top_dialog, "GreetingDialog");
    h.channel.drain("c1");

    // Only the greeting's choice can be answered now
    let report = h.say("red").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::Reprompted);
    let resent = h.channel.drain("c1");
    assert!(matches!(
        &resent[0],
        OutboundMessage::ChoicePrompt { options, .. } if options.iter().any(|o| o.contains("Assessments"))
    ));

    let report = h.say("2").await.unwrap();
    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert!(h
        .channel
        .texts("c1")
        .iter()
        .any(|text| text.contains("My Assessments")));
}

#[tokio::test]
async fn test_cancelled_turn_releases_lock() {
    let classifier = ScriptedClassifier {
        delay: Some(Duration::from_secs(5)),
        ..ScriptedClassifier::new(SCRIPT)
    };
    let h = Harness::build(registry(), classifier, DispatcherConfig::default());

    let turn = tokio::time::timeout(Duration::from_millis(20), h.say("hello")).await;
    assert!(turn.is_err());
    assert_eq!(h.dispatcher.active_conversations(), 0);
    assert!(h.store.snapshot().is_empty());
}

#[tokio::test]
async fn test_external_end_resets_stack_and_data() {
    let h = Harness::new();
    h.say("hello").await.unwrap();
    assert!(h.conversation_data().await.flag("greetDone"));

    h.dispatcher.end_conversation("c1").await.unwrap();
    assert_eq!(h.stack().await, vec!["RootDialog"]);
    assert!(h.conversation_data().await.is_empty());
    let state = h.dispatcher.conversation_state("c1").await.unwrap();
    assert!(state.pending_prompt.is_none());
}
