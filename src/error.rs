//! Error handling module for the wizard
//!
//! Library code returns `WizardError`; binary-level glue uses `anyhow`.
//! Validation problems are NOT errors: they are collected as findings by
//! the validator and shown to the operator.

use thiserror::Error;

/// Main error type for the wizard
#[derive(Error, Debug)]
pub enum WizardError {
    /// IO errors (log file, fact sources, process spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal/presentation errors
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Backend process errors (spawn, wait)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration errors (answers file contents, CLI values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Screen state machine transition errors
    #[error("Transition error: {0}")]
    Transition(String),
}

/// Result type alias for wizard operations
pub type Result<T> = std::result::Result<T, WizardError>;

impl WizardError {
    /// Create a terminal error
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transition error
    pub fn transition(msg: impl Into<String>) -> Self {
        Self::Transition(msg.into())
    }
}
