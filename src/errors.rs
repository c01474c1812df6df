use thiserror::Error;

use crate::provider::StoreError;

/// All errors that can occur in keyguard.
#[derive(Debug, Error)]
pub enum KeyguardError {
    // --- Lookup errors ---
    #[error("Item '{0}' not found")]
    NotFound(String),

    // --- Authentication errors ---
    #[error("Authentication with biometrics failed for {0}")]
    AuthenticationFailed(String),

    // --- Provider errors ---
    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("Keychain consistency error: {0}")]
    Consistency(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Prompt errors ---
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

impl KeyguardError {
    /// Wrap a provider failure with the operation it interrupted.
    pub fn provider(context: impl Into<String>, source: StoreError) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for keyguard results.
pub type Result<T> = std::result::Result<T, KeyguardError>;
