//! Error types for strata-core.

use thiserror::Error;

/// The main error type for backend-agnostic strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    /// An object with the given name is already registered.
    #[error("object '{0}' already exists")]
    ObjectExists(String),

    /// An object with the given name was not found.
    #[error("object '{0}' not found")]
    ObjectNotFound(String),

    /// A property index outside the material's property table.
    #[error("property index {index} out of range (table has {len} entries)")]
    PropertyOutOfRange { index: usize, len: usize },

    /// A property was assigned a value of the wrong kind.
    #[error("property '{label}' expects a {expected} value")]
    PropertyKindMismatch {
        label: &'static str,
        expected: &'static str,
    },

    /// Invalid configuration value.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for strata-core operations.
pub type Result<T> = std::result::Result<T, StrataError>;
