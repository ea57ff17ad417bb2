//! fhevm-client: Encryption and decryption orchestration for fhEVM contracts
//!
//! A [`ClientSession`] connects an FHE engine once and hands out:
//! - [`EncryptionService`]: validate values, fetch the contract key, encrypt
//! - [`DecryptionService`]: user (authorized) and public decryption
//! - [`KeyCache`]: per-contract public keys with TTL and fetch coalescing
//!
//! Engine and key gateway are reached through the [`FheEngine`],
//! [`EngineConnector`] and [`KeySource`] traits. [`GatewayKeySource`] is the
//! HTTP implementation of the latter.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fhevm_client::{ClientSession, EngineConnector, GatewayKeySource};
//! use fhevm_core::{ClientConfig, Network};
//!
//! async fn run(connector: Arc<dyn EngineConnector>) -> anyhow::Result<()> {
//!     let config = ClientConfig::new(Network::Sepolia)
//!         .with_contract("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
//!     let keys = Arc::new(GatewayKeySource::from_config(&config)?);
//!     let session = ClientSession::connect(config, connector, keys).await?;
//!
//!     let payload = session
//!         .encryption()?
//!         .encrypt_uint32(42u32, "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "0x1111111111111111111111111111111111111111")
//!         .await?;
//!     println!("{} handles", payload.handles.len());
//!     Ok(())
//! }
//! ```

mod decryption;
mod encryption;
mod engine;
mod error;
mod gateway;
mod input;
mod key_cache;
mod retry;
mod session;
mod state;

pub mod metrics;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use decryption::{Authorization, DecryptionRequest, DecryptionService, RequestStatus, Requester, Scope};
pub use encryption::EncryptionService;
pub use engine::{EngineConnector, EngineError, EngineInput, FheEngine, KeyMaterial, KeySource};
pub use error::{ClientError, Result};
pub use gateway::{GatewayKeySource, KeyResponse};
pub use input::EncryptedInputBuilder;
pub use key_cache::{KeyCache, PublicKeyRecord};
pub use retry::{RetryPolicy, Retryable};
pub use session::ClientSession;
pub use state::{OperationState, OperationStatus};
