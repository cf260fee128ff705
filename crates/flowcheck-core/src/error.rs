//! Unified error types for flowcheck

use thiserror::Error;

/// Unified error type for all flowcheck operations
#[derive(Error, Debug)]
pub enum FlowError {
    // Element resolution
    #[error("No candidate matched a visible element ({candidates} tried)")]
    ElementNotFound { candidates: usize },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    // Page lifecycle
    #[error("Load signal '{signal}' not reached within {timeout_ms}ms")]
    NavigationTimeout { signal: String, timeout_ms: u64 },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    // Submission and verdicts
    #[error("Submission failed: {0}")]
    SubmissionFailure(String),

    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("Ambiguous outcome: {0}")]
    AmbiguousOutcome(String),

    // Diagnostics
    #[error("Diagnostic capture failed: {0}")]
    Capture(String),

    // Driver
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Context already closed: {0}")]
    ContextGone(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether the error is a bounded-wait expiry rather than a fault
    pub fn is_timeout(&self) -> bool {
        matches!(self, FlowError::NavigationTimeout { .. })
    }
}

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;
