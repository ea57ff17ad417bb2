//! Interfaces to the external FHE engine and key gateway
//!
//! The client never performs ciphertext math itself. It drives these traits
//! and passes their outputs through untouched.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fhevm_core::{Ciphertext, ClientConfig, EncryptedPayload, Plaintext, TypedValue, U256};
use thiserror::Error;

/// Failure surfaced by the engine or the key gateway
///
/// Cloneable so that one failed key fetch can be reported to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Engine failure: {0}")]
    Failure(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Transport(err.to_string())
    }
}

/// Public key material for one contract
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Arc<[u8]>);

impl KeyMaterial {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.0.len())
    }
}

/// Where public keys come from (gateway, chain, or the engine itself)
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_public_key(&self, contract: &str) -> Result<KeyMaterial, EngineError>;
}

/// One engine-side encrypted input under construction
///
/// Values must be encrypted in the order they are added; the returned
/// payload's handles follow that order.
#[async_trait]
pub trait EngineInput: Send {
    fn add_bool(&mut self, value: bool);

    fn add_uint(&mut self, bits: usize, value: U256);

    fn add_address(&mut self, value: &str);

    fn add_bytes(&mut self, value: &[u8]);

    async fn encrypt(self: Box<Self>) -> Result<EncryptedPayload, EngineError>;
}

/// Handle to an initialized FHE engine instance
#[async_trait]
pub trait FheEngine: Send + Sync {
    /// Start an encrypted input bound to `contract` and `requester`
    fn create_input(&self, key: &KeyMaterial, contract: &str, requester: &str) -> Box<dyn EngineInput>;

    /// Decrypt a handle or payload scoped to `contract`
    async fn decrypt(&self, contract: &str, ciphertext: &Ciphertext) -> Result<Plaintext, EngineError>;
}

/// Creates engine handles for a configuration
#[async_trait]
pub trait EngineConnector: Send + Sync {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn FheEngine>, EngineError>;
}

/// Forward a validated value to the engine-side input method for its type
pub(crate) fn add_value(input: &mut dyn EngineInput, value: &TypedValue) {
    match value.plaintext() {
        Plaintext::Bool(b) => input.add_bool(*b),
        Plaintext::Uint(v) => input.add_uint(value.ty().bits().unwrap_or(256), *v),
        Plaintext::Address(a) => input.add_address(a),
        Plaintext::Bytes(b) => input.add_bytes(b),
    }
}
