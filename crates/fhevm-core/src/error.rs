//! Error types for fhevm-core

use thiserror::Error;

use crate::EncryptedType;

/// A value, identity or handle failed local validation.
///
/// Always raised before any I/O and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{ty} value {value} is out of range (max {max})")]
    OutOfRange {
        ty: EncryptedType,
        value: String,
        max: String,
    },

    #[error("{ty} expects {expected}, got {actual}")]
    TypeMismatch {
        ty: EncryptedType,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid {field}: {value} (expected 0x followed by 40 hex digits)")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid hex bytes: {0}")]
    InvalidBytes(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Unsupported type: {0}")]
    UnknownType(String),

    #[error("Encrypted input has no values")]
    EmptyInput,

    #[error("Batch item {index} rejected: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
