//! Error types for the core record model.
//!
//! Covers malformed queries and updates, unknown table names, and
//! configuration loading failures. Storage failures use
//! [`StoreError`](crate::StoreError) instead.

use thiserror::Error;

/// Errors raised by the core model, query engine, and configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Table name is not one of the ten known collections.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// App type is neither `desktop` nor `web`.
    #[error("unknown app type '{0}', expected 'desktop' or 'web'")]
    UnknownAppType(String),

    /// Record identifier is present but not a string.
    #[error("record _id must be a string, got {0}")]
    InvalidId(String),

    /// Query uses an unsupported operator or a malformed operand.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Update document mixes modifiers and fields, or targets `_id`.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// Configuration file I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file YAML parsing failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// No data root could be determined for the current platform.
    #[error("could not determine the application data directory")]
    NoDataRoot,
}

/// Convenience alias for results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
