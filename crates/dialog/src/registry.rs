//! Dialog registry
//!
//! Built once through [`DialogRegistryBuilder`] and then shared read-only
//! (`Arc<DialogRegistry>`) by every turn.

use std::collections::HashMap;
use std::sync::Arc;

use supportbot_config::constants::dialog as defaults;
use supportbot_config::DialogConfig;
use supportbot_core::{IntentResult, RankedIntent};

use crate::definition::DialogDefinition;
use crate::step::StepOutcome;
use crate::DialogError;

/// Immutable set of dialog definitions
#[derive(Debug)]
pub struct DialogRegistry {
    dialogs: HashMap<String, Arc<DialogDefinition>>,
    /// intent -> dialog name
    triggers: HashMap<String, String>,
    root: String,
    fallback: String,
}

impl DialogRegistry {
    pub fn builder() -> DialogRegistryBuilder {
        DialogRegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<DialogDefinition>, DialogError> {
        self.dialogs
            .get(name)
            .ok_or_else(|| DialogError::UnknownDialog(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }

    /// Dialog kept at the bottom of every stack
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Dialog begun when nothing else matches
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Registered dialog names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dialogs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dialog triggered by an intent, if its own confidence floor is met
    pub fn trigger_for(&self, intent: &RankedIntent) -> Option<&Arc<DialogDefinition>> {
        let name = self.triggers.get(&intent.intent)?;
        let dialog = self.dialogs.get(name)?;
        let min = dialog
            .trigger_config()
            .map(|t| t.min_confidence)
            .unwrap_or(0.0);
        (intent.score >= min).then_some(dialog)
    }

    /// Dialog whose trigger matches the best intent at or above `floor`
    pub fn match_trigger(
        &self,
        result: &IntentResult,
        floor: f32,
    ) -> Option<&Arc<DialogDefinition>> {
        result
            .best_above(floor)
            .and_then(|best| self.trigger_for(best))
    }
}

/// Collects definitions and validates them into a [`DialogRegistry`]
#[derive(Debug, Default)]
pub struct DialogRegistryBuilder {
    dialogs: HashMap<String, Arc<DialogDefinition>>,
    triggers: HashMap<String, String>,
    root: Option<String>,
    idle_root: Option<String>,
    fallback: Option<String>,
}

impl DialogRegistryBuilder {
    /// Builder using the root and fallback names from configuration
    ///
    /// The root is installed as a built-in idle dialog unless a definition
    /// with that name is registered.
    pub fn from_config(config: &DialogConfig) -> Self {
        Self {
            idle_root: Some(config.root_dialog.clone()),
            fallback: Some(config.fallback_dialog.clone()),
            ..Self::default()
        }
    }

    /// Register a definition
    pub fn register(&mut self, definition: DialogDefinition) -> Result<&mut Self, DialogError> {
        let name = definition.name().to_string();
        if self.dialogs.contains_key(&name) {
            return Err(DialogError::DuplicateName(name));
        }

        let intent = definition
            .trigger_config()
            .and_then(|t| t.intent.clone());
        if let Some(intent) = &intent {
            if let Some(existing) = self.triggers.get(intent) {
                return Err(DialogError::ConflictingTrigger {
                    intent: intent.clone(),
                    existing: existing.clone(),
                    dialog: name,
                });
            }
            self.triggers.insert(intent.clone(), name.clone());
        }

        tracing::debug!(
            dialog = %name,
            steps = definition.step_count(),
            trigger = intent.as_deref().unwrap_or("-"),
            "Registered dialog"
        );
        self.dialogs.insert(name, Arc::new(definition));
        Ok(self)
    }

    /// Use a registered dialog as the root
    pub fn root(&mut self, name: impl Into<String>) -> &mut Self {
        self.root = Some(name.into());
        self
    }

    /// Install the built-in idle root under `name` if nothing else is registered as root
    pub fn idle_root(&mut self, name: impl Into<String>) -> &mut Self {
        self.idle_root = Some(name.into());
        self
    }

    pub fn fallback(&mut self, name: impl Into<String>) -> &mut Self {
        self.fallback = Some(name.into());
        self
    }

    /// Validate and freeze
    pub fn build(mut self) -> Result<DialogRegistry, DialogError> {
        let root = match self.root.take() {
            Some(name) => {
                if !self.dialogs.contains_key(&name) {
                    return Err(DialogError::UnknownDialog(name));
                }
                name
            }
            None => {
                let name = self
                    .idle_root
                    .take()
                    .unwrap_or_else(|| defaults::ROOT_DIALOG.to_string());
                if !self.dialogs.contains_key(&name) {
                    let idle = DialogDefinition::new(name.clone()).step(|_, _| StepOutcome::Done);
                    self.dialogs.insert(name.clone(), Arc::new(idle));
                }
                name
            }
        };

        let fallback = self
            .fallback
            .take()
            .unwrap_or_else(|| defaults::FALLBACK_DIALOG.to_string());
        if !self.dialogs.contains_key(&fallback) {
            return Err(DialogError::UnknownDialog(fallback));
        }

        tracing::info!(
            dialogs = self.dialogs.len(),
            triggers = self.triggers.len(),
            root = %root,
            fallback = %fallback,
            "Dialog registry built"
        );

        Ok(DialogRegistry {
            dialogs: self.dialogs,
            triggers: self.triggers,
            root,
            fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TriggerConfig;

    fn dialog(name: &str, intent: Option<&str>) -> DialogDefinition {
        let def = DialogDefinition::new(name).step(|_, _| StepOutcome::Done);
        match intent {
            Some(intent) => def.trigger(TriggerConfig::new(intent)),
            None => def,
        }
    }

    fn registry() -> DialogRegistry {
        let mut builder = DialogRegistry::builder();
        builder
            .register(dialog("NoneDialog", Some("None")))
            .unwrap()
            .register(dialog("GreetingDialog", Some("Greet")))
            .unwrap()
            .register(
                DialogDefinition::new("Picky")
                    .step(|_, _| StepOutcome::Done)
                    .trigger(TriggerConfig::new("Pick").min_confidence(0.7)),
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut builder = DialogRegistry::builder();
        builder.register(dialog("A", None)).unwrap();
        assert!(matches!(
            builder.register(dialog("A", None)),
            Err(DialogError::DuplicateName(name)) if name == "A"
        ));
    }

    #[test]
    fn test_conflicting_trigger_is_rejected() {
        let mut builder = DialogRegistry::builder();
        builder.register(dialog("A", Some("Greet"))).unwrap();
        assert!(matches!(
            builder.register(dialog("B", Some("Greet"))),
            Err(DialogError::ConflictingTrigger { existing, .. }) if existing == "A"
        ));
    }

    #[test]
    fn test_build_requires_fallback() {
        let mut builder = DialogRegistry::builder();
        builder.register(dialog("A", None)).unwrap();
        assert!(matches!(
            builder.build(),
            Err(DialogError::UnknownDialog(name)) if name == "NoneDialog"
        ));
    }

    #[test]
    fn test_build_requires_registered_explicit_root() {
        let mut builder = DialogRegistry::builder();
        builder.register(dialog("NoneDialog", None)).unwrap();
        builder.root("Home");
        assert!(matches!(builder.build(), Err(DialogError::UnknownDialog(_))));
    }

    #[test]
    fn test_idle_root_is_installed() {
        let registry = registry();
        assert_eq!(registry.root(), defaults::ROOT_DIALOG);
        assert!(registry.lookup(defaults::ROOT_DIALOG).is_ok());
        assert_eq!(registry.fallback(), "NoneDialog");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_from_config_names() {
        let config = DialogConfig {
            root_dialog: "Home".into(),
            ..DialogConfig::default()
        };
        let mut builder = DialogRegistryBuilder::from_config(&config);
        builder.register(dialog("NoneDialog", None)).unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(registry.root(), "Home");
        assert_eq!(registry.names(), vec!["Home", "NoneDialog"]);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(matches!(
            registry().lookup("Nope"),
            Err(DialogError::UnknownDialog(_))
        ));
    }

    #[test]
    fn test_match_trigger_uses_best_intent() {
        let registry = registry();
        let result = IntentResult::new(
            "hello",
            vec![RankedIntent::new("None", 0.2), RankedIntent::new("Greet", 0.9)],
        );
        assert_eq!(
            registry.match_trigger(&result, 0.0).map(|d| d.name()),
            Some("GreetingDialog")
        );
        // Floor above every score
        assert!(registry.match_trigger(&result, 0.95).is_none());
    }

    #[test]
    fn test_interruption_only_trigger_is_not_matched() {
        let mut builder = DialogRegistry::builder();
        builder
            .register(dialog("NoneDialog", Some("None")))
            .unwrap()
            .register(
                DialogDefinition::new("Booking")
                    .step(|_, _| StepOutcome::Done)
                    .trigger(TriggerConfig::interruption_only().confirm_prompt("Leave?")),
            )
            .unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(registry.len(), 3);
        let result = IntentResult::new("x", vec![RankedIntent::new("Booking", 0.9)]);
        assert!(registry.match_trigger(&result, 0.0).is_none());
    }

    #[test]
    fn test_per_trigger_confidence() {
        let registry = registry();
        let weak = IntentResult::new("pick", vec![RankedIntent::new("Pick", 0.5)]);
        let strong = IntentResult::new("pick", vec![RankedIntent::new("Pick", 0.8)]);
        assert!(registry.match_trigger(&weak, 0.0).is_none());
        assert!(registry.match_trigger(&strong, 0.0).is_some());
    }
}
