//! Fixed-arity record encoding.
//!
//! Every trust record persists as a JSON array of its distributions in a
//! fixed order. A container with the wrong element count is rejected whole.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DecodeError;

/// A record that persists as an ordered, fixed-length array.
pub trait TrustRecord: Sized {
    /// Number of array elements.
    const ARITY: usize;

    fn to_elements(&self) -> Vec<Value>;

    /// Rebuild from exactly [`Self::ARITY`] elements.
    fn from_elements(elements: Vec<Value>) -> Result<Self, DecodeError>;
}

pub fn to_value<R: TrustRecord>(record: &R) -> Value {
    Value::Array(record.to_elements())
}

pub fn from_value<R: TrustRecord>(value: Value) -> Result<R, DecodeError> {
    let Value::Array(elements) = value else {
        return Err(DecodeError::NotAnArray);
    };
    if elements.len() != R::ARITY {
        return Err(DecodeError::Arity {
            expected: R::ARITY,
            found: elements.len(),
        });
    }
    R::from_elements(elements)
}

pub fn serialize<R: TrustRecord>(record: &R) -> Vec<u8> {
    to_value(record).to_string().into_bytes()
}

pub fn deserialize<R: TrustRecord>(bytes: &[u8]) -> Result<R, DecodeError> {
    from_value(serde_json::from_slice(bytes)?)
}

/// Decode one element of a record.
pub(crate) fn element<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    Ok(serde_json::from_value(value)?)
}
