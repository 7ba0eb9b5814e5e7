//! Error types for the medtrack_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medtrack_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A schedule rule failed construction-time validation
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// The add-medicine wizard refused a step transition
    #[error("Wizard error: {0}")]
    Wizard(String),

    /// Profile registration or login failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// An operation needed a logged-in user
    #[error("You must be logged in to perform this action")]
    NotAuthenticated,

    /// Lookup by id found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Picture catalog error
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
