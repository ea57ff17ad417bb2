//! Typed encryption entry points

use std::sync::Arc;

use fhevm_core::validation::validate_batch;
use fhevm_core::{EncryptedPayload, EncryptedType, RawValue, TypedValue};

use crate::engine::FheEngine;
use crate::error::Result;
use crate::input::EncryptedInputBuilder;
use crate::key_cache::KeyCache;
use crate::retry::RetryPolicy;

/// Encrypts single values or batches for a contract and user
///
/// Values are validated before any key fetch or engine call.
#[derive(Clone)]
pub struct EncryptionService {
    engine: Arc<dyn FheEngine>,
    keys: Arc<KeyCache>,
    retry: RetryPolicy,
}

impl EncryptionService {
    pub fn new(engine: Arc<dyn FheEngine>, keys: Arc<KeyCache>, retry: RetryPolicy) -> Self {
        Self { engine, keys, retry }
    }

    /// Start a multi-value input bound to `contract` and `requester`
    pub fn input(&self, contract: &str, requester: &str) -> Result<EncryptedInputBuilder> {
        let builder = EncryptedInputBuilder::new(
            self.engine.clone(),
            self.keys.clone(),
            self.retry,
            contract,
            requester,
        )?;
        Ok(builder)
    }

    /// Encrypt one value as `ty`
    pub async fn encrypt(
        &self,
        ty: EncryptedType,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        let value = TypedValue::new(ty, value)?;
        let mut input = self.input(contract, requester)?;
        input.push(value);
        input.build().await
    }

    pub async fn encrypt_bool(&self, value: bool, contract: &str, requester: &str) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Bool, value, contract, requester).await
    }

    pub async fn encrypt_uint8(
        &self,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Uint8, value, contract, requester).await
    }

    pub async fn encrypt_uint16(
        &self,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Uint16, value, contract, requester).await
    }

    pub async fn encrypt_uint32(
        &self,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Uint32, value, contract, requester).await
    }

    pub async fn encrypt_uint64(
        &self,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Uint64, value, contract, requester).await
    }

    pub async fn encrypt_uint128(
        &self,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Uint128, value, contract, requester).await
    }

    pub async fn encrypt_uint256(
        &self,
        value: impl Into<RawValue>,
        contract: &str,
        requester: &str,
    ) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Uint256, value, contract, requester).await
    }

    pub async fn encrypt_address(&self, value: &str, contract: &str, requester: &str) -> Result<EncryptedPayload> {
        self.encrypt(EncryptedType::Address, value, contract, requester).await
    }

    pub async fn encrypt_bytes(&self, value: &[u8], contract: &str, requester: &str) -> Result<EncryptedPayload> {
        let hex = format!("0x{}", hex::encode(value));
        self.encrypt(EncryptedType::Bytes, hex, contract, requester).await
    }

    /// Encrypt several values into one payload
    ///
    /// Every item is validated first; one bad item rejects the whole batch
    /// and nothing reaches the engine.
    pub async fn batch<I, V>(&self, items: I, contract: &str, requester: &str) -> Result<EncryptedPayload>
    where
        I: IntoIterator<Item = (EncryptedType, V)>,
        V: Into<RawValue>,
    {
        let values = validate_batch(items)?;
        let mut input = self.input(contract, requester)?;
        for value in values {
            input.push(value);
        }
        input.build().await
    }
}
