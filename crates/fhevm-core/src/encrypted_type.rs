//! Encrypted type tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Domain of a value that can be encrypted for an fhEVM contract
///
/// Each tag carries its own validation rule:
/// - `Bool`: strictly boolean
/// - `UintN`: non-negative integer no larger than 2^N - 1
/// - `Address`: `0x` followed by 40 hex digits
/// - `Bytes`: `0x`-prefixed hex of even length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptedType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    Uint256,
    Address,
    Bytes,
}

impl EncryptedType {
    /// Every supported type, in declaration order
    pub const ALL: [EncryptedType; 9] = [
        EncryptedType::Bool,
        EncryptedType::Uint8,
        EncryptedType::Uint16,
        EncryptedType::Uint32,
        EncryptedType::Uint64,
        EncryptedType::Uint128,
        EncryptedType::Uint256,
        EncryptedType::Address,
        EncryptedType::Bytes,
    ];

    /// Integer width for `uintN` types, `None` otherwise
    pub fn bits(&self) -> Option<usize> {
        match self {
            EncryptedType::Uint8 => Some(8),
            EncryptedType::Uint16 => Some(16),
            EncryptedType::Uint32 => Some(32),
            EncryptedType::Uint64 => Some(64),
            EncryptedType::Uint128 => Some(128),
            EncryptedType::Uint256 => Some(256),
            _ => None,
        }
    }

    /// Returns true for the unsigned integer types
    pub fn is_uint(&self) -> bool {
        self.bits().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptedType::Bool => "bool",
            EncryptedType::Uint8 => "uint8",
            EncryptedType::Uint16 => "uint16",
            EncryptedType::Uint32 => "uint32",
            EncryptedType::Uint64 => "uint64",
            EncryptedType::Uint128 => "uint128",
            EncryptedType::Uint256 => "uint256",
            EncryptedType::Address => "address",
            EncryptedType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for EncryptedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptedType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EncryptedType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownType(s.to_string()))
    }
}
