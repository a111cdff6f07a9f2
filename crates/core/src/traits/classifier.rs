//! Intent classifier trait

use async_trait::async_trait;

use crate::{ClassifierError, IntentResult};

/// Natural-language-understanding interface
///
/// Implementations:
/// - `LuisClassifier` - hosted LUIS-style HTTP endpoint
/// - `KeywordClassifier` - offline regex rules for local runs and tests
///
/// The dialog engine never parses a wire protocol; it only consumes the
/// ranked result. Adapters translate every failure into a
/// [`ClassifierError`].
///
/// # Example
///
/// ```ignore
/// let classifier: Arc<dyn IntentClassifier> = Arc::new(KeywordClassifier::support_bot());
/// let result = classifier.classify("I'd like to book a webinar").await?;
/// assert_eq!(result.best().unwrap().intent, "BookWebinar");
/// ```
#[async_trait]
pub trait IntentClassifier: Send + Sync + 'static {
    /// Classify an utterance
    async fn classify(&self, utterance: &str) -> Result<IntentResult, ClassifierError>;

    /// Name for logging
    fn name(&self) -> &str;
}
