//! Intent classification for the support bot
//!
//! Two [`IntentClassifier`] implementations:
//! - [`LuisClassifier`] - hosted LUIS v2 endpoint over HTTP
//! - [`KeywordClassifier`] - offline regex rules with the support bot's intents
//!
//! Use [`build_classifier`] to pick one from configuration.

pub mod keyword;
pub mod luis;

pub use keyword::{KeywordClassifier, KeywordRule};
pub use luis::{LuisClassifier, LuisConfig};

use std::sync::Arc;

use supportbot_config::{ClassifierConfig, ClassifierProvider};
use supportbot_core::{ClassifierError, IntentClassifier};

/// Build the configured classifier
pub fn build_classifier(
    config: &ClassifierConfig,
) -> Result<Arc<dyn IntentClassifier>, ClassifierError> {
    match config.provider {
        ClassifierProvider::Keyword => {
            tracing::info!("Using offline keyword classifier");
            Ok(Arc::new(KeywordClassifier::support_bot()))
        }
        ClassifierProvider::Luis => {
            let luis = LuisClassifier::new(LuisConfig::from_settings(config)?)?;
            tracing::info!(host = %config.host, "Using LUIS classifier");
            Ok(Arc::new(luis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_keyword_classifier() {
        let classifier = build_classifier(&ClassifierConfig::default()).unwrap();
        assert_eq!(classifier.name(), "keyword");
    }

    #[test]
    fn test_build_luis_without_credentials_fails() {
        let config = ClassifierConfig {
            provider: ClassifierProvider::Luis,
            ..Default::default()
        };
        assert!(matches!(
            build_classifier(&config),
            Err(ClassifierError::Configuration(_))
        ));
    }
}
