use thiserror::Error;

/// Structural problems with an account address string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidAddress {
    #[error("address cannot be empty")]
    Empty,
    #[error("address length {len} is outside {min}..={max}")]
    Length { len: usize, min: usize, max: usize },
    #[error("address contains non-base58 character '{ch}' at index {index}")]
    InvalidChar { ch: char, index: usize },
    #[error("address decodes to {len} bytes, expected 32")]
    DecodedLength { len: usize },
}

/// Raised when an individual raw transaction descriptor cannot be mapped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("transaction descriptor must be a JSON object")]
    NotAnObject,
    #[error("transaction descriptor has no signature")]
    MissingId,
    #[error("field '{field}' has an unexpected shape: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Batch operations reject unusable input before any work is scheduled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("at least one address is required")]
    EmptyAddressSet,
    #[error("history limit must be greater than zero")]
    ZeroLimit,
}

/// Environment configuration that could not be interpreted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name}='{value}' is not a valid {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Top-level error type for request-surface operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lifecycle operations on a monitor session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),
    #[error("monitor session has been shut down")]
    Closed,
}
