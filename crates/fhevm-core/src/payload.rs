//! Engine-produced artifacts: payloads, handles and ciphertext references
//!
//! This crate never inspects ciphertext or proof bytes; they are carried
//! between the engine and the caller as-is.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ValidationError;

/// Minimum length of a handle string, `0x` prefix included
const MIN_HANDLE_LEN: usize = 11;

/// Opaque reference to an encrypted value, usable in follow-up contract calls
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    /// Parse a `0x`-prefixed hex handle
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let well_formed = value.len() >= MIN_HANDLE_LEN
            && value.starts_with("0x")
            && value[2..].bytes().all(|b| b.is_ascii_hexdigit());

        if well_formed {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidHandle(value))
        }
    }

    /// Build a handle from raw bytes (engines use this when minting handles)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        Self::parse(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Handle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Handle::parse(value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ciphertext, proof of well-formedness and handles for one encrypted input
///
/// `handles` is positionally aligned with the order values were appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub input_proof: Vec<u8>,
    pub handles: Vec<Handle>,
}

impl EncryptedPayload {
    /// Handle for the value appended at `index`
    pub fn handle(&self, index: usize) -> Option<&Handle> {
        self.handles.get(index)
    }
}

/// Something that can be decrypted: a bare handle or a whole payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ciphertext {
    Handle(Handle),
    Payload(EncryptedPayload),
}

impl Ciphertext {
    /// Check the ciphertext is well formed before it is sent anywhere
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Ciphertext::Handle(_) => Ok(()),
            Ciphertext::Payload(p) if p.ciphertext.is_empty() && p.handles.is_empty() => Err(
                ValidationError::InvalidHandle("payload carries no ciphertext or handles".into()),
            ),
            Ciphertext::Payload(_) => Ok(()),
        }
    }
}

impl From<Handle> for Ciphertext {
    fn from(handle: Handle) -> Self {
        Ciphertext::Handle(handle)
    }
}

impl From<&Handle> for Ciphertext {
    fn from(handle: &Handle) -> Self {
        Ciphertext::Handle(handle.clone())
    }
}

impl From<EncryptedPayload> for Ciphertext {
    fn from(payload: EncryptedPayload) -> Self {
        Ciphertext::Payload(payload)
    }
}

mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_str = format!("0x{}", hex::encode(bytes));
        serializer.serialize_str(&hex_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parse() {
        assert!(Handle::parse("0x0123456789abcdef").is_ok());
        assert!(Handle::parse("0x1234").is_err());
        assert!(Handle::parse("0123456789abcdef").is_err());
        assert!(Handle::parse("0x0123456789abcdeg").is_err());
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = EncryptedPayload {
            ciphertext: vec![0xca, 0xfe],
            input_proof: vec![0x01],
            handles: vec![Handle::from_bytes(&[0xab; 32]).unwrap()],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["ciphertext"], "0xcafe");
        assert_eq!(json["inputProof"], "0x01");
        assert_eq!(json["handles"][0], format!("0x{}", "ab".repeat(32)));

        let back: EncryptedPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_handle_deserialize_validates() {
        assert!(serde_json::from_str::<Handle>("\"0x12\"").is_err());
    }

    #[test]
    fn test_empty_payload_is_invalid_ciphertext() {
        let empty = Ciphertext::Payload(EncryptedPayload {
            ciphertext: vec![],
            input_proof: vec![],
            handles: vec![],
        });
        assert!(empty.validate().is_err());
    }
}
