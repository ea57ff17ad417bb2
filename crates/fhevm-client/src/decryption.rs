//! Decryption requests and typed decryption
//!
//! User-scoped decryption requires an authorization from the requester;
//! public decryption has none and is only meaningful for ciphertexts the
//! contract has marked publicly decryptable.

use std::fmt;
use std::sync::Arc;

use fhevm_core::validation::validate_address;
use fhevm_core::{Ciphertext, EncryptedType, Plaintext, U256};

use crate::engine::FheEngine;
use crate::error::{ClientError, Result};
use crate::metrics::{self, OP_DECRYPT};
use crate::retry::RetryPolicy;

/// Signature authorizing decryption on behalf of a user
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization(String);

impl Authorization {
    pub fn new(signature: impl Into<String>) -> Self {
        Self(signature.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Authorization(..)")
    }
}

/// The user a decryption is performed for
#[derive(Debug, Clone)]
pub struct Requester {
    pub address: String,
    pub authorization: Option<Authorization>,
}

impl Requester {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            authorization: None,
        }
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    InFlight,
    Resolved,
    Failed,
}

#[derive(Debug, Clone)]
pub enum Scope {
    User(Requester),
    Public,
}

/// One decryption and its lifecycle
///
/// Status moves from `Pending` to `InFlight` to `Resolved` or `Failed`. A
/// request rejected by local checks goes straight to `Failed`.
#[derive(Debug, Clone)]
pub struct DecryptionRequest {
    ciphertext: Ciphertext,
    expected: Option<EncryptedType>,
    contract: String,
    scope: Scope,
    status: RequestStatus,
}

impl DecryptionRequest {
    pub fn user(
        ciphertext: impl Into<Ciphertext>,
        expected: EncryptedType,
        contract: impl Into<String>,
        requester: Requester,
    ) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            expected: Some(expected),
            contract: contract.into(),
            scope: Scope::User(requester),
            status: RequestStatus::Pending,
        }
    }

    pub fn public(ciphertext: impl Into<Ciphertext>, contract: impl Into<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            expected: None,
            contract: contract.into(),
            scope: Scope::Public,
            status: RequestStatus::Pending,
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Local checks run before anything is sent to the engine
    fn check(&self) -> Result<()> {
        self.ciphertext.validate()?;
        validate_address("contract address", &self.contract)?;

        if let Scope::User(requester) = &self.scope {
            validate_address("user address", &requester.address)?;
            if requester.authorization.is_none() {
                return Err(ClientError::DecryptionAuthorization {
                    contract: self.contract.clone(),
                    requester: requester.address.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct DecryptionService {
    engine: Arc<dyn FheEngine>,
    retry: RetryPolicy,
    default_contract: Option<String>,
}

impl DecryptionService {
    pub fn new(engine: Arc<dyn FheEngine>, retry: RetryPolicy) -> Self {
        Self {
            engine,
            retry,
            default_contract: None,
        }
    }

    /// Contract that [`public`](Self::public) decrypts against
    pub fn with_default_contract(mut self, contract: impl Into<String>) -> Self {
        self.default_contract = Some(contract.into());
        self
    }

    /// Run a request to completion, updating its status
    pub async fn execute(&self, request: &mut DecryptionRequest) -> Result<Plaintext> {
        let result = self.run(request).await;
        request.status = if result.is_ok() {
            RequestStatus::Resolved
        } else {
            RequestStatus::Failed
        };
        result
    }

    async fn run(&self, request: &mut DecryptionRequest) -> Result<Plaintext> {
        request.check()?;
        request.status = RequestStatus::InFlight;

        let engine = &self.engine;
        let contract = request.contract.as_str();
        let ciphertext = &request.ciphertext;

        let plaintext = self
            .retry
            .execute(OP_DECRYPT, move || async move {
                let result = engine.decrypt(contract, ciphertext).await;
                metrics::record_engine_call(OP_DECRYPT, result.is_ok());
                result
            })
            .await?;

        if let Some(expected) = request.expected {
            if !plaintext.fits(expected) {
                return Err(unexpected(expected, &plaintext));
            }
        }

        tracing::debug!(contract = %contract, kind = plaintext.kind(), "Decrypted ciphertext");
        Ok(plaintext)
    }

    /// Decrypt on behalf of `requester`, checking the result has type `ty`
    pub async fn decrypt(
        &self,
        ty: EncryptedType,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<Plaintext> {
        let mut request = DecryptionRequest::user(ciphertext, ty, contract, requester.clone());
        self.execute(&mut request).await
    }

    pub async fn decrypt_bool(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<bool> {
        match self.decrypt(EncryptedType::Bool, ciphertext, contract, requester).await? {
            Plaintext::Bool(b) => Ok(b),
            other => Err(unexpected(EncryptedType::Bool, &other)),
        }
    }

    pub async fn decrypt_uint8(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<u8> {
        let value = self.decrypt_uint(EncryptedType::Uint8, ciphertext, contract, requester).await?;
        u8::try_from(value).map_err(|_| overflow(EncryptedType::Uint8))
    }

    pub async fn decrypt_uint16(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<u16> {
        let value = self.decrypt_uint(EncryptedType::Uint16, ciphertext, contract, requester).await?;
        u16::try_from(value).map_err(|_| overflow(EncryptedType::Uint16))
    }

    pub async fn decrypt_uint32(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<u32> {
        let value = self.decrypt_uint(EncryptedType::Uint32, ciphertext, contract, requester).await?;
        u32::try_from(value).map_err(|_| overflow(EncryptedType::Uint32))
    }

    pub async fn decrypt_uint64(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<u64> {
        let value = self.decrypt_uint(EncryptedType::Uint64, ciphertext, contract, requester).await?;
        u64::try_from(value).map_err(|_| overflow(EncryptedType::Uint64))
    }

    pub async fn decrypt_uint128(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<u128> {
        let value = self.decrypt_uint(EncryptedType::Uint128, ciphertext, contract, requester).await?;
        u128::try_from(value).map_err(|_| overflow(EncryptedType::Uint128))
    }

    pub async fn decrypt_uint256(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<U256> {
        self.decrypt_uint(EncryptedType::Uint256, ciphertext, contract, requester).await
    }

    pub async fn decrypt_address(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<String> {
        match self.decrypt(EncryptedType::Address, ciphertext, contract, requester).await? {
            Plaintext::Address(a) => Ok(a),
            other => Err(unexpected(EncryptedType::Address, &other)),
        }
    }

    pub async fn decrypt_bytes(
        &self,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<Vec<u8>> {
        match self.decrypt(EncryptedType::Bytes, ciphertext, contract, requester).await? {
            Plaintext::Bytes(b) => Ok(b),
            other => Err(unexpected(EncryptedType::Bytes, &other)),
        }
    }

    async fn decrypt_uint(
        &self,
        ty: EncryptedType,
        ciphertext: impl Into<Ciphertext>,
        contract: &str,
        requester: &Requester,
    ) -> Result<U256> {
        match self.decrypt(ty, ciphertext, contract, requester).await? {
            Plaintext::Uint(v) => Ok(v),
            other => Err(unexpected(ty, &other)),
        }
    }

    /// Decrypt a publicly decryptable ciphertext without authorization,
    /// scoped to the session's configured contract
    pub async fn public(&self, ciphertext: impl Into<Ciphertext>) -> Result<Plaintext> {
        let contract = self.default_contract.as_deref().ok_or_else(|| {
            ClientError::Config(fhevm_core::Error::InvalidConfig(
                "public decryption needs a contract address".into(),
            ))
        })?;
        self.public_for(ciphertext, contract).await
    }

    /// Public decryption against an explicit contract
    pub async fn public_for(&self, ciphertext: impl Into<Ciphertext>, contract: &str) -> Result<Plaintext> {
        let mut request = DecryptionRequest::public(ciphertext, contract);
        self.execute(&mut request).await
    }

    /// Decrypt several ciphertexts for one requester, in order
    ///
    /// All items are checked before the first engine call. The first engine
    /// failure aborts the batch and is returned; no partial results.
    pub async fn batch<I, C>(&self, items: I, contract: &str, requester: &Requester) -> Result<Vec<Plaintext>>
    where
        I: IntoIterator<Item = (C, EncryptedType)>,
        C: Into<Ciphertext>,
    {
        let mut requests: Vec<DecryptionRequest> = items
            .into_iter()
            .map(|(ciphertext, ty)| DecryptionRequest::user(ciphertext, ty, contract, requester.clone()))
            .collect();

        for request in &requests {
            request.check()?;
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in &mut requests {
            results.push(self.execute(request).await?);
        }
        Ok(results)
    }
}

fn unexpected(expected: EncryptedType, actual: &Plaintext) -> ClientError {
    ClientError::UnexpectedPlaintext {
        expected,
        actual: actual.kind().to_string(),
    }
}

fn overflow(expected: EncryptedType) -> ClientError {
    ClientError::UnexpectedPlaintext {
        expected,
        actual: "out-of-range integer".to_string(),
    }
}
