//! Configuration management for the support bot
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, then `config/{env}.*`)
//! - Environment variables (SUPPORTBOT_ prefix, `__` section separator)
//! - Runtime overrides on the deserialized [`Settings`]

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, BotSettings, ClassifierConfig, ClassifierProvider,
    DialogConfig, ObservabilityConfig, PersistenceBackend, PersistenceConfig, RuntimeEnvironment,
    Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
