//! Error types for the detection engine.

use thiserror::Error;

/// Errors that can occur during detection and configuration.
#[derive(Debug, Error)]
pub enum WordguardError {
    /// Malformed or oversized input, rejected before any rule runs.
    #[error("validation error: {0}")]
    Validation(String),

    /// A single detection rule failed. The orchestrator isolates these and
    /// degrades the rule to an empty contribution.
    #[error("rule '{rule}' failed: {message}")]
    Rule {
        /// Name of the failing rule.
        rule: String,
        /// Failure description.
        message: String,
    },

    /// The arbitration pipeline failed. Fatal for the request; no partial
    /// result is returned.
    #[error("arbitration error: {0}")]
    Arbitration(String),

    /// Invalid or unparseable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error reading configuration or wordlist files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WordguardError {
    /// Creates a rule failure error.
    pub fn rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, WordguardError>;
