//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the legal intelligence engine, providing
//! structured error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from ingestion, pipeline, search and alerts
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Ingestion, Pipeline, Search, Storage, Alerts, Config
//!
//! ## Key Features
//! - Hierarchical error types with detailed context
//! - Automatic error conversion and chaining
//! - User-friendly error messages for API responses
//! - Structured logging integration

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, IntelError>;

/// Error types for the legal intelligence engine
#[derive(Debug, Error)]
pub enum IntelError {
    /// Network-related errors
    #[error("Network error: {details}")]
    Network { details: String },

    /// A consumed external service (extraction, NLP, AI provider, vector
    /// store, notification transport) failed or returned an invalid response
    #[error("External service '{service}' failed: {details}")]
    ExternalService { service: String, details: String },

    /// Data parsing errors
    #[error("Failed to parse data from {origin}: {details}")]
    DataParsing { origin: String, details: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Ingestion errors
    /// A raw record carried an external_ref that already exists
    #[error("Resolution '{external_ref}' already exists")]
    DuplicateReference { external_ref: String },

    /// A raw record's full text hashed to an already-known content hash
    #[error("Resolution '{external_ref}' duplicates existing content")]
    DuplicateContent { external_ref: String },

    // Pipeline errors
    /// No extractable text for a document; fatal for that document only
    #[error("No text available for resolution '{external_ref}'")]
    MissingText { external_ref: String },

    // Search errors
    #[error("Invalid search query: {reason}")]
    InvalidQuery { reason: String },

    // Storage errors
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // Alert errors
    #[error("Alert limit reached for the current plan ({max})")]
    AlertLimitReached { max: u32 },
}

impl IntelError {
    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            IntelError::Config { .. } | IntelError::Toml(_) => "configuration",
            IntelError::DuplicateReference { .. }
            | IntelError::DuplicateContent { .. }
            | IntelError::DataParsing { .. } => "ingestion",
            IntelError::MissingText { .. } => "pipeline",
            IntelError::InvalidQuery { .. } => "search",
            IntelError::Database(_)
            | IntelError::SerializationFailed { .. }
            | IntelError::NotFound { .. } => "storage",
            IntelError::AlertLimitReached { .. } => "alerts",
            IntelError::Network { .. }
            | IntelError::ExternalService { .. }
            | IntelError::Http(_) => "external",
            IntelError::Internal { .. } | IntelError::ValidationFailed { .. } => "generic",
        }
    }

    /// Dedup conflicts are expected operating conditions, not failures
    pub fn is_dedup_conflict(&self) -> bool {
        matches!(
            self,
            IntelError::DuplicateReference { .. } | IntelError::DuplicateContent { .. }
        )
    }
}

impl From<std::io::Error> for IntelError {
    fn from(err: std::io::Error) -> Self {
        IntelError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for IntelError {
    fn from(err: serde_json::Error) -> Self {
        IntelError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<bincode::Error> for IntelError {
    fn from(err: bincode::Error) -> Self {
        IntelError::SerializationFailed {
            message: format!("Binary serialization error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let err = IntelError::DuplicateReference {
            external_ref: "STS 123/2024".to_string(),
        };
        assert_eq!(err.category(), "ingestion");
        assert!(err.is_dedup_conflict());

        let err = IntelError::MissingText {
            external_ref: "BOE-A-2024-1".to_string(),
        };
        assert_eq!(err.category(), "pipeline");
        assert!(!err.is_dedup_conflict());
    }
}
