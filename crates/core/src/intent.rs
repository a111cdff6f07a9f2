//! Intent classification results
//!
//! An [`IntentResult`] is produced fresh for every classified turn and is
//! never persisted.

use serde::{Deserialize, Serialize};

/// A single ranked intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedIntent {
    /// Intent name as known by the classifier
    pub intent: String,
    /// Confidence score (0.0 - 1.0)
    pub score: f32,
}

impl RankedIntent {
    pub fn new(intent: impl Into<String>, score: f32) -> Self {
        Self {
            intent: intent.into(),
            score,
        }
    }
}

/// Entity extracted from an utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Matched text
    pub entity: String,
    /// Entity type (e.g. `builtin.datetimeV2.date`)
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Character offset of the first matched character
    pub start_index: usize,
    /// Character offset of the last matched character
    pub end_index: usize,
    /// Confidence, when the classifier reports one
    #[serde(default)]
    pub score: Option<f32>,
}

/// Output of one classifier call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    /// The classified utterance
    pub query: String,
    /// Intents in the order the classifier ranked them
    pub intents: Vec<RankedIntent>,
    /// Extracted entities
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl IntentResult {
    pub fn new(query: impl Into<String>, intents: Vec<RankedIntent>) -> Self {
        Self {
            query: query.into(),
            intents,
            entities: Vec::new(),
        }
    }

    /// Attach entities
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    /// Best intent whose score is at least `floor`
    ///
    /// Highest score wins; equal scores keep the classifier's ranking order.
    pub fn best_above(&self, floor: f32) -> Option<&RankedIntent> {
        self.intents
            .iter()
            .filter(|candidate| candidate.score >= floor)
            .fold(None, |best: Option<&RankedIntent>, candidate| match best {
                Some(current) if current.score >= candidate.score => Some(current),
                _ => Some(candidate),
            })
    }

    /// Best intent without any floor
    pub fn best(&self) -> Option<&RankedIntent> {
        self.best_above(f32::NEG_INFINITY)
    }

    /// Score of a named intent, if ranked
    pub fn score_of(&self, intent: &str) -> Option<f32> {
        self.intents
            .iter()
            .find(|candidate| candidate.intent == intent)
            .map(|candidate| candidate.score)
    }

    /// First entity of a given type
    pub fn entity(&self, entity_type: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }
}
