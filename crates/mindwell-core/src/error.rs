//! Core error types for mindwell-core.
//!
//! This module defines the error hierarchy using thiserror. The remote
//! store's `RemoteError` lives with the remote module; everything else is
//! collected here under the `CoreError` umbrella.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

/// Core error type for mindwell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Remote store errors
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Purchase and entitlement errors
    #[error("Purchase error: {0}")]
    Purchase(#[from] PurchaseError),

    /// Companion completion errors
    #[error("Completion error: {0}")]
    Llm(#[from] LlmError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Local cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to open the cache database
    #[error("Failed to open cache at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Cache query failed: {0}")]
    QueryFailed(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::QueryFailed(err.to_string())
    }
}

/// Purchase and entitlement errors.
#[derive(Error, Debug)]
pub enum PurchaseError {
    /// User backed out of the platform purchase dialog.
    #[error("Purchase cancelled by user")]
    Cancelled,

    /// Product identifier matches neither the monthly nor the yearly set.
    #[error("Unknown product identifier: {0}")]
    UnknownProduct(String),

    /// Platform store reported a failure
    #[error("Store provider error: {0}")]
    Provider(String),

    /// Purchase payload failed validation
    #[error("Receipt validation failed: {0}")]
    Validation(String),
}

/// Text-completion collaborator errors.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key configured; fatal at client construction.
    #[error("Completion API key is not configured")]
    MissingApiKey,

    /// Transport failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success response from the completion API
    #[error("Completion API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Response carried no text content
    #[error("Completion response carried no text content")]
    EmptyCompletion,
}

/// Errors surfaced by the chat service.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Daily free-tier message quota exhausted. An expected state the UI
    /// renders as "limit reached", not a fault.
    #[error("Daily message limit reached")]
    LimitReached,

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Completion error: {0}")]
    Llm(#[from] LlmError),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
