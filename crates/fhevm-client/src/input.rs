//! Encrypted input builder
//!
//! Accumulates validated values bound to one contract and requester, then
//! encrypts them in a single engine round-trip. Handles in the resulting
//! payload follow append order.

use std::sync::Arc;

use fhevm_core::validation::{validate_address, validate_batch};
use fhevm_core::{EncryptedPayload, EncryptedType, RawValue, TypedValue, ValidationError};

use crate::engine::{self, EngineError, FheEngine};
use crate::error::{ClientError, Result};
use crate::key_cache::KeyCache;
use crate::metrics::{self, OP_ENCRYPT};
use crate::retry::RetryPolicy;

pub struct EncryptedInputBuilder {
    engine: Arc<dyn FheEngine>,
    keys: Arc<KeyCache>,
    retry: RetryPolicy,
    contract: String,
    requester: String,
    values: Vec<TypedValue>,
}

impl EncryptedInputBuilder {
    pub(crate) fn new(
        engine: Arc<dyn FheEngine>,
        keys: Arc<KeyCache>,
        retry: RetryPolicy,
        contract: &str,
        requester: &str,
    ) -> std::result::Result<Self, ValidationError> {
        validate_address("contract address", contract)?;
        validate_address("user address", requester)?;

        Ok(Self {
            engine,
            keys,
            retry,
            contract: contract.to_string(),
            requester: requester.to_string(),
            values: Vec::new(),
        })
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validate `value` as `ty` and append it
    ///
    /// A rejected value leaves the builder unchanged.
    pub fn append(
        &mut self,
        ty: EncryptedType,
        value: impl Into<RawValue>,
    ) -> std::result::Result<&mut Self, ValidationError> {
        let value = TypedValue::new(ty, value)?;
        Ok(self.push(value))
    }

    /// Append an already validated value
    pub fn push(&mut self, value: TypedValue) -> &mut Self {
        self.values.push(value);
        self
    }

    /// Append a batch, all or nothing
    pub fn extend<I, V>(&mut self, items: I) -> std::result::Result<&mut Self, ValidationError>
    where
        I: IntoIterator<Item = (EncryptedType, V)>,
        V: Into<RawValue>,
    {
        let values = validate_batch(items)?;
        self.values.extend(values);
        Ok(self)
    }

    pub fn add_bool(&mut self, value: bool) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Bool, value)
    }

    pub fn add_u8(&mut self, value: impl Into<RawValue>) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Uint8, value)
    }

    pub fn add_u16(&mut self, value: impl Into<RawValue>) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Uint16, value)
    }

    pub fn add_u32(&mut self, value: impl Into<RawValue>) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Uint32, value)
    }

    pub fn add_u64(&mut self, value: impl Into<RawValue>) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Uint64, value)
    }

    pub fn add_u128(&mut self, value: impl Into<RawValue>) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Uint128, value)
    }

    pub fn add_u256(&mut self, value: impl Into<RawValue>) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Uint256, value)
    }

    pub fn add_address(&mut self, value: &str) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Address, value)
    }

    pub fn add_bytes(&mut self, value: &[u8]) -> std::result::Result<&mut Self, ValidationError> {
        self.append(EncryptedType::Bytes, format!("0x{}", hex::encode(value)))
    }

    /// Encrypt everything appended so far
    ///
    /// Consumes the builder, so an input can only be built once. Engine
    /// failures are retried; each attempt starts a fresh engine input.
    pub async fn build(self) -> Result<EncryptedPayload> {
        if self.values.is_empty() {
            return Err(ValidationError::EmptyInput.into());
        }

        let record = self.keys.get_key(&self.contract).await?;

        let engine = &self.engine;
        let values = &self.values;
        let key = record.key();
        let contract = self.contract.as_str();
        let requester = self.requester.as_str();

        let payload = self
            .retry
            .execute(OP_ENCRYPT, move || async move {
                let mut input = engine.create_input(key, contract, requester);
                for value in values {
                    engine::add_value(input.as_mut(), value);
                }
                let result = input.encrypt().await;
                metrics::record_engine_call(OP_ENCRYPT, result.is_ok());
                result
            })
            .await?;

        if payload.handles.len() != values.len() {
            return Err(ClientError::Engine(EngineError::Failure(format!(
                "engine returned {} handles for {} values",
                payload.handles.len(),
                values.len()
            ))));
        }

        tracing::debug!(
            contract = %contract,
            values = values.len(),
            ciphertext_bytes = payload.ciphertext.len(),
            "Encrypted input"
        );

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryEngine, StaticKeySource, CONTRACT, USER};
    use fhevm_core::Plaintext;
    use std::time::Duration;

    fn builder(engine: &MemoryEngine) -> EncryptedInputBuilder {
        let keys = Arc::new(KeyCache::new(
            Arc::new(StaticKeySource::new()),
            Duration::from_secs(60),
            RetryPolicy::no_retry(),
        ));
        EncryptedInputBuilder::new(
            Arc::new(engine.clone()),
            keys,
            RetryPolicy::new(3, Duration::from_millis(10)),
            CONTRACT,
            USER,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_identities() {
        let engine = MemoryEngine::new();
        let keys = Arc::new(KeyCache::new(
            Arc::new(StaticKeySource::new()),
            Duration::from_secs(60),
            RetryPolicy::no_retry(),
        ));
        let err = EncryptedInputBuilder::new(
            Arc::new(engine),
            keys,
            RetryPolicy::no_retry(),
            "0x1234",
            USER,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ValidationError::InvalidAddress { field: "contract address", .. }));
    }

    #[test]
    fn test_rejected_value_leaves_builder_unchanged() {
        let engine = MemoryEngine::new();
        let mut input = builder(&engine);
        input.add_u8(7u8).unwrap();

        assert!(input.add_u8(256u32).is_err());
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let engine = MemoryEngine::new();
        let mut input = builder(&engine);

        let err = input
            .extend(vec![
                (EncryptedType::Uint8, RawValue::from(1u8)),
                (EncryptedType::Uint8, RawValue::from(300u32)),
            ])
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::BatchItem { index: 1, .. }));
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn test_empty_build_is_rejected() {
        let engine = MemoryEngine::new();
        let err = builder(&engine).build().await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::EmptyInput)));
        assert_eq!(engine.encrypt_calls(), 0);
    }

    #[tokio::test]
    async fn test_handles_follow_append_order() {
        let engine = MemoryEngine::new();
        let mut input = builder(&engine);
        input
            .add_bool(true)
            .unwrap()
            .add_u32(42u32)
            .unwrap()
            .add_address(USER)
            .unwrap();

        let payload = input.build().await.unwrap();
        assert_eq!(payload.handles.len(), 3);
        assert_eq!(engine.encrypt_calls(), 1);

        let expected = [
            Plaintext::Bool(true),
            Plaintext::Uint(fhevm_core::U256::from(42u32)),
            Plaintext::Address(USER.to_string()),
        ];
        for (handle, want) in payload.handles.iter().zip(expected) {
            let got = engine.decrypt(CONTRACT, &handle.into()).await.unwrap();
            assert_eq!(got, want);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_retries_engine_failures() {
        let engine = MemoryEngine::new();
        engine.fail_next_encrypts(2);
        let mut input = builder(&engine);
        input.add_u64(1u64).unwrap();

        let payload = input.build().await.unwrap();
        assert_eq!(payload.handles.len(), 1);
        assert_eq!(engine.encrypt_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_surfaces_last_engine_error() {
        let engine = MemoryEngine::new();
        engine.fail_next_encrypts(5);
        let mut input = builder(&engine);
        input.add_u64(1u64).unwrap();

        let err = input.build().await.unwrap_err();
        assert!(matches!(err, ClientError::Engine(EngineError::Transport(_))));
        assert_eq!(engine.encrypt_calls(), 3);
    }
}
