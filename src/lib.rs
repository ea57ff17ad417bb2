//! fhevm-sdk: client-side encryption and decryption for fhEVM contracts
//!
//! Re-exports the workspace crates:
//! - [`fhevm_core`]: encrypted types, validation, payloads and configuration
//! - [`fhevm_client`]: sessions, key cache, encryption and decryption services

pub use fhevm_client;
pub use fhevm_core;

pub use fhevm_client::{
    Authorization, ClientError, ClientSession, DecryptionService, EncryptionService, GatewayKeySource,
    Requester,
};
pub use fhevm_core::{ClientConfig, EncryptedPayload, EncryptedType, Handle, Network, Plaintext, U256};
