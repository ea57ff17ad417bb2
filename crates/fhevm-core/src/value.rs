//! Raw, validated and decrypted plaintext values

use alloy_primitives::U256;
use std::fmt;
use std::str::FromStr;

use crate::{validation, EncryptedType, ValidationError};

/// Caller-supplied value that has not been checked against a type yet
///
/// Signed integers are representable on purpose so that `-1` reaches the
/// validator and is rejected there instead of failing to construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Bool(bool),
    Int(i128),
    BigUint(U256),
    Str(String),
}

impl RawValue {
    /// Interpret command-line text as a value for `ty`
    ///
    /// Text that does not look like the expected shape is kept as a string so
    /// the validator reports the mismatch.
    pub fn parse_as(ty: EncryptedType, text: &str) -> Self {
        let text = text.trim();
        match ty {
            EncryptedType::Bool => match text {
                "true" => RawValue::Bool(true),
                "false" => RawValue::Bool(false),
                _ => RawValue::Str(text.to_string()),
            },
            _ if ty.is_uint() => {
                if text.starts_with('-') {
                    text.parse::<i128>()
                        .map(RawValue::Int)
                        .unwrap_or_else(|_| RawValue::Str(text.to_string()))
                } else {
                    U256::from_str(text)
                        .map(RawValue::BigUint)
                        .unwrap_or_else(|_| RawValue::Str(text.to_string()))
                }
            }
            _ => RawValue::Str(text.to_string()),
        }
    }

    /// Short name of the value's shape, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "boolean",
            RawValue::Int(_) | RawValue::BigUint(_) => "integer",
            RawValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Int(i) => write!(f, "{}", i),
            RawValue::BigUint(u) => write!(f, "{}", u),
            RawValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RawValue {
                fn from(value: $t) -> Self {
                    RawValue::Int(i128::from(value))
                }
            }
        )*
    };
}

impl_from_int!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

impl From<u128> for RawValue {
    fn from(value: u128) -> Self {
        RawValue::BigUint(U256::from(value))
    }
}

impl From<U256> for RawValue {
    fn from(value: U256) -> Self {
        RawValue::BigUint(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Str(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Str(value)
    }
}

/// A validated plaintext in its normalized form
///
/// This is what engines receive for encryption and return from decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plaintext {
    Bool(bool),
    Uint(U256),
    Address(String),
    Bytes(Vec<u8>),
}

impl Plaintext {
    pub fn kind(&self) -> &'static str {
        match self {
            Plaintext::Bool(_) => "boolean",
            Plaintext::Uint(_) => "integer",
            Plaintext::Address(_) => "address",
            Plaintext::Bytes(_) => "bytes",
        }
    }

    /// Whether this plaintext lies in the domain of `ty`
    pub fn fits(&self, ty: EncryptedType) -> bool {
        match (self, ty) {
            (Plaintext::Bool(_), EncryptedType::Bool) => true,
            (Plaintext::Uint(v), _) => ty
                .bits()
                .map(|bits| *v <= validation::uint_max(bits))
                .unwrap_or(false),
            (Plaintext::Address(a), EncryptedType::Address) => {
                validation::validate_address("address", a).is_ok()
            }
            (Plaintext::Bytes(_), EncryptedType::Bytes) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plaintext::Bool(b) => write!(f, "{}", b),
            Plaintext::Uint(u) => write!(f, "{}", u),
            Plaintext::Address(a) => f.write_str(a),
            Plaintext::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

/// A value paired with the encrypted type it will be encrypted as
///
/// Can only be built through [`TypedValue::new`], so holding one proves the
/// value passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    ty: EncryptedType,
    plaintext: Plaintext,
}

impl TypedValue {
    pub fn new(ty: EncryptedType, raw: impl Into<RawValue>) -> Result<Self, ValidationError> {
        let plaintext = validation::check(&raw.into(), ty)?;
        Ok(Self { ty, plaintext })
    }

    pub fn ty(&self) -> EncryptedType {
        self.ty
    }

    pub fn plaintext(&self) -> &Plaintext {
        &self.plaintext
    }

    pub fn into_plaintext(self) -> Plaintext {
        self.plaintext
    }
}
