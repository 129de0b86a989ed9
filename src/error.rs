// src/error.rs

//! Unified error handling for the mirror application.

use std::fmt;

use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Zip archive could not be read
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catalog kept throttling after the retry budget was spent
    #[error("Rate limit exceeded for {kind} page {page} after {attempts} attempts")]
    RateLimitExceeded {
        kind: String,
        page: u32,
        attempts: u32,
    },

    /// Non-throttle failure response from a remote endpoint
    #[error("Remote fetch failed with status {status}: {body}")]
    RemoteFetch { status: u16, body: String },

    /// Package archive could not be extracted
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// External command exited unsuccessfully
    #[error("Command `{program}` failed: {message}")]
    Command { program: String, message: String },

    /// Operation did not finish in time
    #[error("Timed out after {secs}s: {what}")]
    Timeout { what: String, secs: u64 },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error.
    pub fn extraction(message: impl fmt::Display) -> Self {
        Self::Extraction(message.to_string())
    }

    /// Create a command failure with context.
    pub fn command(program: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Command {
            program: program.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the catalog gave up on us.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }
}
