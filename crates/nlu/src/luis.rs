//! LUIS v2 HTTP classifier
//!
//! Queries `https://{host}/luis/v2.0/apps/{app_id}` with the subscription
//! key and utterance as query parameters, then maps the JSON response onto
//! [`IntentResult`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use supportbot_config::ClassifierConfig;
use supportbot_core::{ClassifierError, Entity, IntentClassifier, IntentResult, RankedIntent};

/// LUIS endpoint configuration
#[derive(Debug, Clone)]
pub struct LuisConfig {
    /// Endpoint host, e.g. `westus.api.cognitive.microsoft.com`
    pub host: String,
    /// Application id
    pub app_id: String,
    /// Subscription key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Ask for every intent instead of only the top one
    pub verbose: bool,
}

impl LuisConfig {
    pub fn new(host: impl Into<String>, app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            app_id: app_id.into(),
            api_key: api_key.into(),
            timeout: Duration::from_millis(supportbot_config::constants::classifier::TIMEOUT_MS),
            verbose: true,
        }
    }

    /// Build from the classifier settings section
    pub fn from_settings(settings: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let app_id = settings
            .app_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ClassifierError::Configuration("LUIS app id required".to_string()))?;
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ClassifierError::Configuration("LUIS API key required".to_string()))?;

        let mut config = Self::new(settings.host.clone(), app_id, api_key);
        config.timeout = Duration::from_millis(settings.timeout_ms);
        Ok(config)
    }

    /// Endpoint URL without query parameters
    pub fn endpoint(&self) -> String {
        let host = self
            .host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("https://{}/luis/v2.0/apps/{}", host, self.app_id)
    }
}

/// Intent entry in a LUIS response
#[derive(Debug, Deserialize)]
struct LuisIntent {
    intent: String,
    #[serde(default)]
    score: f32,
}

/// Entity entry in a LUIS response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisEntity {
    entity: String,
    #[serde(rename = "type")]
    entity_type: String,
    start_index: usize,
    end_index: usize,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisResponse {
    #[serde(default)]
    query: String,
    #[serde(default)]
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    intents: Vec<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

impl LuisResponse {
    fn into_intent_result(self) -> IntentResult {
        let mut intents: Vec<RankedIntent> = if self.intents.is_empty() {
            self.top_scoring_intent
                .into_iter()
                .map(|i| RankedIntent::new(i.intent, i.score))
                .collect()
        } else {
            self.intents
                .into_iter()
                .map(|i| RankedIntent::new(i.intent, i.score))
                .collect()
        };
        intents.sort_by(|a, b| b.score.total_cmp(&a.score));

        let entities = self
            .entities
            .into_iter()
            .map(|e| Entity {
                entity: e.entity,
                entity_type: e.entity_type,
                start_index: e.start_index,
                end_index: e.end_index,
                score: e.score,
            })
            .collect();

        IntentResult::new(self.query, intents).with_entities(entities)
    }
}

/// Parse a raw LUIS v2 response body
pub fn parse_response(body: &str) -> Result<IntentResult, ClassifierError> {
    let response: LuisResponse = serde_json::from_str(body)
        .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
    Ok(response.into_intent_result())
}

/// Classifier backed by a hosted LUIS application
pub struct LuisClassifier {
    client: Client,
    config: LuisConfig,
}

impl LuisClassifier {
    pub fn new(config: LuisConfig) -> Result<Self, ClassifierError> {
        if config.app_id.is_empty() || config.api_key.is_empty() {
            return Err(ClassifierError::Configuration(
                "LUIS app id and API key required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ClassifierError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ClassifierError {
        if err.is_timeout() {
            ClassifierError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            ClassifierError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl IntentClassifier for LuisClassifier {
    async fn classify(&self, utterance: &str) -> Result<IntentResult, ClassifierError> {
        let verbose = if self.config.verbose { "true" } else { "false" };
        let response = self
            .client
            .get(self.config.endpoint())
            .query(&[
                ("subscription-key", self.config.api_key.as_str()),
                ("verbose", verbose),
                ("q", utterance),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ClassifierError::Unauthorized(format!("HTTP {}", status))
                }
                _ => ClassifierError::Transport(format!("HTTP {}: {}", status, body)),
            });
        }

        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        let result = parse_response(&body)?;

        tracing::debug!(
            intent = result.best().map(|i| i.intent.as_str()).unwrap_or("<none>"),
            confidence = result.best().map(|i| i.score).unwrap_or(0.0),
            entities = result.entities.len(),
            "LUIS classification"
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        "luis"
    }
}
