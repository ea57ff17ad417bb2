//! Client error types

use fhevm_core::{EncryptedType, ValidationError};
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Client not initialized. Call init() first.")]
    Uninitialized,

    #[error("Failed to fetch public key for {contract}: {source}")]
    KeyFetch {
        contract: String,
        #[source]
        source: EngineError,
    },

    #[error("Decryption for {requester} on {contract} requires an authorization signature")]
    DecryptionAuthorization { contract: String, requester: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Engine returned a {actual} plaintext for a {expected} ciphertext")]
    UnexpectedPlaintext {
        expected: EncryptedType,
        actual: String,
    },

    #[error("Config error: {0}")]
    Config(#[from] fhevm_core::Error),
}

impl ClientError {
    /// Whether the failure may be transient and worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::KeyFetch { .. } | ClientError::Engine(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
