//! Type validation for encrypted inputs
//!
//! Pure and deterministic: nothing here performs I/O, so every check can run
//! as a pre-flight step before a request is attempted.

use alloy_primitives::U256;

use crate::{EncryptedType, Plaintext, RawValue, TypedValue, ValidationError};

/// Length of a `0x`-prefixed 20-byte address
const ADDRESS_LEN: usize = 42;

/// Largest value representable in `bits` unsigned bits
pub fn uint_max(bits: usize) -> U256 {
    U256::MAX >> (256 - bits)
}

/// Validate `value` against the domain of `ty`
pub fn validate(value: &RawValue, ty: EncryptedType) -> Result<(), ValidationError> {
    check(value, ty).map(|_| ())
}

/// Validate `value` against `ty` and return its normalized form
pub fn check(value: &RawValue, ty: EncryptedType) -> Result<Plaintext, ValidationError> {
    match ty {
        EncryptedType::Bool => match value {
            RawValue::Bool(b) => Ok(Plaintext::Bool(*b)),
            other => Err(mismatch(ty, "boolean", other)),
        },
        EncryptedType::Address => match value {
            RawValue::Str(s) => {
                validate_address("address value", s)?;
                Ok(Plaintext::Address(s.clone()))
            }
            other => Err(mismatch(ty, "hex string", other)),
        },
        EncryptedType::Bytes => match value {
            RawValue::Str(s) => decode_hex_bytes(s).map(Plaintext::Bytes),
            other => Err(mismatch(ty, "hex string", other)),
        },
        EncryptedType::Uint8
        | EncryptedType::Uint16
        | EncryptedType::Uint32
        | EncryptedType::Uint64
        | EncryptedType::Uint128
        | EncryptedType::Uint256 => {
            let bits = ty.bits().unwrap_or(256);
            check_uint(value, ty, uint_max(bits))
        }
    }
}

fn check_uint(value: &RawValue, ty: EncryptedType, max: U256) -> Result<Plaintext, ValidationError> {
    let out_of_range = || ValidationError::OutOfRange {
        ty,
        value: value.to_string(),
        max: max.to_string(),
    };

    let v = match value {
        RawValue::Int(i) if *i < 0 => return Err(out_of_range()),
        RawValue::Int(i) => U256::from(i.unsigned_abs()),
        RawValue::BigUint(u) => *u,
        other => return Err(mismatch(ty, "integer", other)),
    };

    if v > max {
        return Err(out_of_range());
    }
    Ok(Plaintext::Uint(v))
}

/// Validate a `0x`-prefixed 20-byte hex address
///
/// `field` names what is being validated (contract, requester, value) so the
/// error points at the right argument.
pub fn validate_address(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let valid = value.len() == ADDRESS_LEN
        && value.starts_with("0x")
        && value[2..].bytes().all(|b| b.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        })
    }
}

/// Decode a `0x`-prefixed hex string of even length
pub fn decode_hex_bytes(value: &str) -> Result<Vec<u8>, ValidationError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::InvalidBytes(format!("{} is missing the 0x prefix", value)))?;

    if digits.len() % 2 != 0 {
        return Err(ValidationError::InvalidBytes(format!(
            "{} has an odd number of hex digits",
            value
        )));
    }

    hex::decode(digits).map_err(|e| ValidationError::InvalidBytes(format!("{}: {}", value, e)))
}

/// Validate every item of a batch, rejecting the whole batch on the first failure
///
/// Nothing is returned unless all items pass, so callers never hold a partially
/// validated batch.
pub fn validate_batch<I, V>(items: I) -> Result<Vec<TypedValue>, ValidationError>
where
    I: IntoIterator<Item = (EncryptedType, V)>,
    V: Into<RawValue>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, (ty, raw))| {
            TypedValue::new(ty, raw).map_err(|e| ValidationError::BatchItem {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

fn mismatch(ty: EncryptedType, expected: &'static str, actual: &RawValue) -> ValidationError {
    ValidationError::TypeMismatch {
        ty,
        expected,
        actual: actual.kind(),
    }
}
