//! Error types for voxrelay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    // Provider errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Provider not initialized: {message}")]
    InvalidState { message: String },

    // Audio staging errors
    #[error("Audio staging failed: {message}")]
    Staging { message: String },

    // Side-channel errors
    #[error("Notification delivery failed: {message}")]
    Notification { message: String },

    // Authentication errors
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Shorthand for a missing or empty credential variable.
    pub fn missing_env(var: &str) -> Self {
        RelayError::Configuration {
            message: format!("environment variable '{}' is not set", var),
        }
    }

    /// Shorthand for an operation invoked before `initialize()`.
    pub fn not_initialized(provider: &str) -> Self {
        RelayError::InvalidState {
            message: format!("{} used before initialize()", provider),
        }
    }

    /// True for failures that mean the pipeline cannot run at all for this provider.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::Configuration { .. }
                | RelayError::ConfigInvalidValue { .. }
                | RelayError::Config(_)
                | RelayError::InvalidState { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;
