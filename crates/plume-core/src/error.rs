//! Error types for Plume

use thiserror::Error;

/// The main error type for Plume operations
#[derive(Debug, Error)]
pub enum PlumeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid field type: {field} expected {expected}")]
    InvalidFieldType { field: String, expected: String },

    #[error("Value out of range: {field} must be between {min} and {max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

impl PlumeError {
    /// Shorthand for a `ValueOutOfRange` on an `f32` field
    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64, value: f32) -> Self {
        PlumeError::ValueOutOfRange {
            field: field.into(),
            min,
            max,
            value: value as f64,
        }
    }
}

/// Result type alias for Plume operations
pub type Result<T> = std::result::Result<T, PlumeError>;

impl From<toml::de::Error> for PlumeError {
    fn from(err: toml::de::Error) -> Self {
        PlumeError::TomlParseError(err.to_string())
    }
}
