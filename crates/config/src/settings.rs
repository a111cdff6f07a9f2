//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{bot, classifier, dialog, persistence, ENV_PREFIX};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Dialog engine limits and well-known dialog names
    #[serde(default)]
    pub dialog: DialogConfig,

    /// Intent classifier selection
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// State store selection
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Bot persona and scripted-flow options
    #[serde(default)]
    pub bot: BotSettings,
}

/// Dialog engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogConfig {
    /// Dialog kept at the bottom of every stack
    #[serde(default = "default_root_dialog")]
    pub root_dialog: String,

    /// Dialog begun when no trigger matches
    #[serde(default = "default_fallback_dialog")]
    pub fallback_dialog: String,

    /// Intent identifier treated as "nothing matched"
    #[serde(default = "default_fallback_intent")]
    pub fallback_intent: String,

    /// Intents scoring below this are ignored
    #[serde(default)]
    pub min_confidence: f32,

    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,

    #[serde(default = "default_max_transitions")]
    pub max_transitions_per_turn: usize,
}

fn default_root_dialog() -> String {
    dialog::ROOT_DIALOG.to_string()
}
fn default_fallback_dialog() -> String {
    dialog::FALLBACK_DIALOG.to_string()
}
fn default_fallback_intent() -> String {
    dialog::FALLBACK_INTENT.to_string()
}
fn default_max_stack_depth() -> usize {
    dialog::MAX_STACK_DEPTH
}
fn default_max_transitions() -> usize {
    dialog::MAX_TRANSITIONS_PER_TURN
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            root_dialog: default_root_dialog(),
            fallback_dialog: default_fallback_dialog(),
            fallback_intent: default_fallback_intent(),
            min_confidence: 0.0,
            max_stack_depth: default_max_stack_depth(),
            max_transitions_per_turn: default_max_transitions(),
        }
    }
}

/// Which classifier backs the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    /// Offline keyword rules
    #[default]
    Keyword,
    /// Hosted LUIS endpoint
    Luis,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub provider: ClassifierProvider,

    /// LUIS application id
    #[serde(default)]
    pub app_id: Option<String>,

    /// LUIS subscription key
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_luis_host")]
    pub host: String,

    /// Per-request timeout, also bounds the dispatcher's wait
    #[serde(default = "default_classifier_timeout")]
    pub timeout_ms: u64,
}

fn default_luis_host() -> String {
    classifier::LUIS_HOST.to_string()
}
fn default_classifier_timeout() -> u64 {
    classifier::TIMEOUT_MS
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::default(),
            app_id: None,
            api_key: None,
            host: default_luis_host(),
            timeout_ms: default_classifier_timeout(),
        }
    }
}

/// Which state store backs the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    /// One JSON document per scope and id
    File,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Root directory for the file backend
    #[serde(default = "default_state_directory")]
    pub directory: String,

    /// Write user-scoped data to the durable backend
    #[serde(default = "default_true")]
    pub persist_user_data: bool,

    /// Write conversation-scoped data to the durable backend
    #[serde(default = "default_true")]
    pub persist_conversation_data: bool,
}

fn default_state_directory() -> String {
    persistence::DIRECTORY.to_string()
}
fn default_true() -> bool {
    true
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            directory: default_state_directory(),
            persist_user_data: true,
            persist_conversation_data: true,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Install the Prometheus recorder
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Options read by the scripted support flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Name used to address the user when the profile has none
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Echo recognized intents back to the user
    #[serde(default)]
    pub debug_talk: bool,
}

fn default_user_name() -> String {
    bot::USER_NAME.to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            debug_talk: false,
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_dialog()?;
        self.validate_classifier()?;
        self.validate_persistence()?;
        self.validate_observability()?;
        Ok(())
    }

    pub(crate) fn validate_dialog(&self) -> Result<(), ConfigError> {
        let dialog = &self.dialog;

        for (field, value) in [
            ("dialog.root_dialog", &dialog.root_dialog),
            ("dialog.fallback_dialog", &dialog.fallback_dialog),
            ("dialog.fallback_intent", &dialog.fallback_intent),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field.to_string()));
            }
        }

        if dialog.root_dialog == dialog.fallback_dialog {
            return Err(ConfigError::InvalidValue {
                field: "dialog.fallback_dialog".to_string(),
                message: "Fallback dialog must differ from the root dialog".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&dialog.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "dialog.min_confidence".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", dialog.min_confidence),
            });
        }

        // Root plus at least one dialog on top of it
        if dialog.max_stack_depth < 2 {
            return Err(ConfigError::InvalidValue {
                field: "dialog.max_stack_depth".to_string(),
                message: format!("Must be at least 2, got {}", dialog.max_stack_depth),
            });
        }

        if dialog.max_transitions_per_turn == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dialog.max_transitions_per_turn".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub(crate) fn validate_classifier(&self) -> Result<(), ConfigError> {
        let cfg = &self.classifier;

        if !(classifier::MIN_TIMEOUT_MS..=classifier::MAX_TIMEOUT_MS).contains(&cfg.timeout_ms) {
            return Err(ConfigError::InvalidValue {
                field: "classifier.timeout_ms".to_string(),
                message: format!(
                    "Must be between {} and {}, got {}",
                    classifier::MIN_TIMEOUT_MS,
                    classifier::MAX_TIMEOUT_MS,
                    cfg.timeout_ms
                ),
            });
        }

        if cfg.provider == ClassifierProvider::Luis {
            if cfg.host.trim().is_empty() {
                return Err(ConfigError::MissingField("classifier.host".to_string()));
            }

            let missing: Vec<&str> = [
                ("classifier.app_id", &cfg.app_id),
                ("classifier.api_key", &cfg.api_key),
            ]
            .into_iter()
            .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
            .map(|(name, _)| name)
            .collect();

            if let Some(first) = missing.first() {
                if self.environment.is_strict() {
                    return Err(ConfigError::MissingField(first.to_string()));
                }
                tracing::warn!(
                    missing = ?missing,
                    "LUIS classifier selected without credentials; requests will fail"
                );
            }
        }

        Ok(())
    }

    pub(crate) fn validate_persistence(&self) -> Result<(), ConfigError> {
        if self.persistence.backend == PersistenceBackend::File
            && self.persistence.directory.trim().is_empty()
        {
            return Err(ConfigError::MissingField(
                "persistence.directory".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn validate_observability(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        let level = self.observability.log_level.to_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "observability.log_level".to_string(),
                message: format!("Unknown level '{}'", self.observability.log_level),
            });
        }
        Ok(())
    }
}

/// Load settings from files and environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

/// Load settings from an explicit file, still honoring environment overrides
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
