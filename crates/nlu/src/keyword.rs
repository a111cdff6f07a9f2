//! Offline keyword classifier
//!
//! Config-driven regex rules mapping utterances to intents. Every rule that
//! matches contributes its confidence to its intent; an intent's score is the
//! highest confidence among its matching rules. Utterances matching nothing
//! classify as the `None` intent.
//!
//! # Example
//!
//! ```
//! use supportbot_nlu::KeywordClassifier;
//!
//! let classifier = KeywordClassifier::support_bot();
//! let result = classifier.classify_sync("hello there");
//! assert_eq!(result.best().unwrap().intent, "Greet");
//! ```

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use supportbot_core::{ClassifierError, Entity, IntentClassifier, IntentResult, RankedIntent};

/// Intent reported when no rule matches
pub const NONE_INTENT: &str = "None";

/// One keyword rule as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Intent this rule votes for
    pub intent: String,
    /// Regex pattern, matched case-insensitively
    pub pattern: String,
    /// Score reported when the pattern matches
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.8
}

impl KeywordRule {
    pub fn new(intent: &str, pattern: &str, confidence: f32) -> Self {
        Self {
            intent: intent.to_string(),
            pattern: pattern.to_string(),
            confidence,
        }
    }
}

struct CompiledRule {
    intent: String,
    regex: Regex,
    confidence: f32,
}

/// Weekday names extracted as `builtin.datetimeV2.date` entities
static WEEKDAY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").ok()
});

/// Regex rule classifier
pub struct KeywordClassifier {
    rules: Vec<CompiledRule>,
}

impl KeywordClassifier {
    /// Create a classifier from rules
    ///
    /// Rules whose pattern fails to compile are skipped with a warning.
    pub fn from_rules(rules: Vec<KeywordRule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            match Regex::new(&format!("(?i){}", rule.pattern)) {
                Ok(regex) => compiled.push(CompiledRule {
                    intent: rule.intent,
                    regex,
                    confidence: rule.confidence.clamp(0.0, 1.0),
                }),
                Err(e) => {
                    tracing::warn!(
                        intent = %rule.intent,
                        pattern = %rule.pattern,
                        error = %e,
                        "Failed to compile keyword pattern"
                    );
                }
            }
        }
        Self { rules: compiled }
    }

    /// Load rules from a YAML list of `{intent, pattern, confidence}`
    pub fn from_yaml(yaml: &str) -> Result<Self, ClassifierError> {
        let rules: Vec<KeywordRule> = serde_yaml::from_str(yaml)
            .map_err(|e| ClassifierError::Configuration(format!("Invalid keyword rules: {}", e)))?;
        Ok(Self::from_rules(rules))
    }

    /// Rules covering the support bot's intents
    pub fn support_bot() -> Self {
        Self::from_rules(support_bot_rules())
    }

    /// Number of usable rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Classify without going through the async trait
    pub fn classify_sync(&self, utterance: &str) -> IntentResult {
        let mut ranked: Vec<RankedIntent> = Vec::new();

        for rule in &self.rules {
            if !rule.regex.is_match(utterance) {
                continue;
            }
            match ranked.iter_mut().find(|r| r.intent == rule.intent) {
                Some(existing) => existing.score = existing.score.max(rule.confidence),
                None => ranked.push(RankedIntent::new(rule.intent.clone(), rule.confidence)),
            }
        }

        if ranked.is_empty() {
            ranked.push(RankedIntent::new(NONE_INTENT, 1.0));
        } else {
            // Stable: equal scores keep rule order
            ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        IntentResult::new(utterance, ranked).with_entities(extract_entities(utterance))
    }
}

fn extract_entities(utterance: &str) -> Vec<Entity> {
    let Some(weekday) = WEEKDAY.as_ref() else {
        return Vec::new();
    };
    weekday
        .find_iter(utterance)
        .map(|m| Entity {
            entity: m.as_str().to_lowercase(),
            entity_type: "builtin.datetimeV2.date".to_string(),
            start_index: utterance[..m.start()].chars().count(),
            end_index: utterance[..m.end()].chars().count().saturating_sub(1),
            score: None,
        })
        .collect()
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, utterance: &str) -> Result<IntentResult, ClassifierError> {
        let result = self.classify_sync(utterance);
        tracing::debug!(
            utterance,
            intent = result.best().map(|i| i.intent.as_str()).unwrap_or(NONE_INTENT),
            "Keyword classification"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

fn support_bot_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(
            "Greet",
            r"^\s*(hi|hello|hey|hiya|howdy|good (morning|afternoon|evening))\b",
            0.9,
        ),
        KeywordRule::new("BookWebinar", r"\bwebinars?\b", 0.85),
        KeywordRule::new("BookWebinar", r"\bbook\b", 0.7),
        KeywordRule::new("BookWebinar", r"\b(tutorial|orientation)s?\b", 0.6),
        KeywordRule::new("SubmitAssessment", r"\b(submit|upload|hand in)\b", 0.85),
        KeywordRule::new("FindAssessment", r"\bassessments?\b", 0.8),
        KeywordRule::new("MessageTrainer", r"\b(trainer|tutor|teacher)\b", 0.85),
        KeywordRule::new(
            "ContactSupport",
            r"\b(support|help desk|helpdesk|contact|live agent|speak to (a|someone))\b",
            0.8,
        ),
        KeywordRule::new(
            "AffirmativeAnswer",
            r"^\s*(yes|yeah|yep|yup|sure|ok|okay|of course|absolutely|definitely|please do)\b",
            0.9,
        ),
        KeywordRule::new(
            "NegativeAnswer",
            r"^\s*(no|nope|nah|not really|not now|no thanks)\b",
            0.9,
        ),
        KeywordRule::new(
            "AskingInfo",
            r"\b(info|information|more about|tell me|details|what is|what are|how do)\b",
            0.75,
        ),
        KeywordRule::new(
            "EndConversation",
            r"\b(bye|goodbye|see you|that'?s all|quit|exit)\b",
            0.9,
        ),
    ]
}
