//! Centralized defaults for the support bot
//!
//! Single source of truth for values shared by the settings defaults and the
//! crates that fall back to them.

/// Dialog engine defaults
pub mod dialog {
    /// Dialog that sits at the bottom of every stack
    pub const ROOT_DIALOG: &str = "RootDialog";

    /// Dialog begun when nothing else matches
    pub const FALLBACK_DIALOG: &str = "NoneDialog";

    /// Intent name classifiers use for "no intent"
    pub const FALLBACK_INTENT: &str = "None";

    /// Maximum number of dialog instances on one stack
    pub const MAX_STACK_DEPTH: usize = 16;

    /// Step transitions allowed within a single turn
    pub const MAX_TRANSITIONS_PER_TURN: usize = 64;
}

/// Hosted classifier defaults
pub mod classifier {
    pub const LUIS_HOST: &str = "westus.api.cognitive.microsoft.com";

    /// Request timeout
    pub const TIMEOUT_MS: u64 = 5000;

    pub const MIN_TIMEOUT_MS: u64 = 100;
    pub const MAX_TIMEOUT_MS: u64 = 60_000;
}

/// State persistence defaults
pub mod persistence {
    pub const DIRECTORY: &str = "data/state";
}

/// Bot persona defaults
pub mod bot {
    /// Name used when the user profile has none
    pub const USER_NAME: &str = "Sara";
}

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "SUPPORTBOT";
