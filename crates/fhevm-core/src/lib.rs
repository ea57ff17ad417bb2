//! fhevm-core: Core types and validation for the fhEVM client SDK
//!
//! This crate defines what a caller can ask to encrypt and what comes back:
//! - [`EncryptedType`]: the supported encrypted domains (`bool`, `uintN`, `address`, `bytes`)
//! - [`RawValue`] / [`TypedValue`]: caller input before and after validation
//! - [`EncryptedPayload`] / [`Handle`]: opaque engine output
//! - [`ClientConfig`]: network selection and endpoint overrides
//!
//! # Trust Boundary
//!
//! | Concern | Where it lives |
//! |---------|----------------|
//! | Value domain checks | **here**, before any I/O |
//! | Ciphertext / proof bytes | FHE engine, passed through untouched |
//! | Key material | gateway, cached by the client session |
//! | Signatures (EIP-712) | wallet, only checked for presence |
//!
//! Nothing in this crate performs network I/O or cryptography.

mod config;
mod encrypted_type;
mod error;
mod payload;
mod value;

pub mod validation;

pub use config::{
    ClientConfig, Network, RetrySettings, DEFAULT_BASE_DELAY_MS, DEFAULT_KEY_TTL_SECS,
    DEFAULT_MAX_ATTEMPTS,
};
pub use encrypted_type::EncryptedType;
pub use error::{Error, ValidationError};
pub use payload::{Ciphertext, EncryptedPayload, Handle};
pub use validation::{validate, validate_address};
pub use value::{Plaintext, RawValue, TypedValue};

/// Re-exported so callers can build wide integer values without a direct dependency
pub use alloy_primitives::U256;

pub type Result<T> = std::result::Result<T, Error>;

/// Shorten an address for display, keeping `chars` characters at each end
pub fn format_address(address: &str, chars: usize) -> String {
    if address.len() < chars * 2 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..chars], &address[address.len() - chars..])
}
