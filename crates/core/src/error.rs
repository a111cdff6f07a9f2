//! Errors raised at the external boundaries of the bot

use thiserror::Error;

/// Classifier errors
///
/// All of these are transient from the dialog engine's point of view:
/// the turn is abandoned and the user may simply repeat themselves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Classification timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClassifierError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// State store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_transience() {
        assert!(ClassifierError::Timeout(500).is_transient());
        assert!(ClassifierError::Transport("reset".into()).is_transient());
        assert!(!ClassifierError::Unauthorized("bad key".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ClassifierError::Timeout(250);
        assert_eq!(err.to_string(), "Classification timed out after 250ms");

        let err = StoreError::Backend("disk full".into());
        assert!(err.to_string().contains("disk full"));
    }
}
