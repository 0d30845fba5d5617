//! Arbitrary-precision field elements.
//!
//! `FieldElement` wraps an unsigned big integer representing a value in
//! `[0, p)` for whatever scalar field prime `p` the caller's proof system
//! uses. This crate never performs field arithmetic itself (no add, no
//! mul) — it only compares, orders, and serializes values. All algebra
//! happens inside the injected [`crate::hasher::FieldHasher`].

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// An element of `F`, backed by an arbitrary-precision unsigned integer.
///
/// `FieldElement` does not itself enforce `< p`; callers construct elements
/// from bytes or `u64`s that are already known to be in range (the hash
/// oracle and the KV-store round trip are the only places values cross a
/// trust boundary, and both are injected).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldElement(BigUint);

impl FieldElement {
    /// The sentinel/empty value, `0`. Reserved: user keys must never be zero.
    pub fn zero() -> Self {
        FieldElement(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_u64(v: u64) -> Self {
        FieldElement(BigUint::from(v))
    }

    /// Parses a big-endian byte string (no fixed width assumed).
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        FieldElement(BigUint::from_bytes_be(bytes))
    }

    /// Minimal big-endian encoding (no leading zero bytes; `0` encodes as
    /// an empty slice). Used for internal-hash and size values, where
    /// width is implied by content rather than fixed.
    pub fn to_minimal_be_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// Fixed-width, left-padded big-endian encoding of length `width`.
    /// Used for the leaf-record storage key, where padding is load-bearing:
    /// it is what makes byte-lexicographic order on the KV store match
    /// numeric order on `F` (see `keys::leaf_key`).
    pub fn to_padded_be_bytes(&self, width: usize) -> Result<Vec<u8>, CodecError> {
        let raw = self.0.to_bytes_be();
        if raw.len() > width {
            return Err(CodecError::FieldElementTooLarge {
                width,
                got: raw.len(),
            });
        }
        let mut out = vec![0u8; width - raw.len()];
        out.extend_from_slice(&raw);
        Ok(out)
    }

    /// Returns this value as a `u64` if it fits, otherwise truncates via
    /// modular reduction by `2^64` (only ever used for `index`/`size`
    /// which are always small by construction).
    pub fn to_u64_saturating(&self) -> u64 {
        let digits = self.0.to_u64_digits();
        digits.first().copied().unwrap_or(0)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement(0x{})", hex::encode(self.to_minimal_be_bytes()))
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_minimal_be_bytes()))
    }
}

impl From<u64> for FieldElement {
    fn from(v: u64) -> Self {
        FieldElement::from_u64(v)
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.to_minimal_be_bytes()))
        } else {
            serializer.serialize_bytes(&self.to_minimal_be_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let s = s.strip_prefix("0x").unwrap_or(&s);
            let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
            Ok(FieldElement::from_be_bytes(&bytes))
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            Ok(FieldElement::from_be_bytes(&bytes))
        }
    }
}

#[cfg(any(test, feature = "fuzzing"))]
impl proptest::arbitrary::Arbitrary for FieldElement {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        (1u64..=u64::MAX).prop_map(FieldElement::from_u64).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        assert!(FieldElement::zero().is_zero());
        assert!(FieldElement::from_u64(0).is_zero());
    }

    #[test]
    fn minimal_encoding_drops_leading_zeros() {
        let fe = FieldElement::from_u64(5);
        assert_eq!(fe.to_minimal_be_bytes(), vec![5]);
        assert!(FieldElement::zero().to_minimal_be_bytes().is_empty());
    }

    #[test]
    fn padded_encoding_left_pads() {
        let fe = FieldElement::from_u64(5);
        let padded = fe.to_padded_be_bytes(4).unwrap();
        assert_eq!(padded, vec![0, 0, 0, 5]);
    }

    #[test]
    fn padded_encoding_rejects_overflow() {
        let fe = FieldElement::from_u64(0x1_0000_0000);
        assert!(fe.to_padded_be_bytes(4).is_err());
    }

    #[test]
    fn padding_preserves_numeric_order_lexicographically() {
        // Fixed-width left-padding makes byte-lexicographic order agree
        // with numeric order, which is what makes `get_lt` usable as a
        // strict-predecessor read.
        let a = FieldElement::from_u64(3).to_padded_be_bytes(32).unwrap();
        let b = FieldElement::from_u64(300).to_padded_be_bytes(32).unwrap();
        assert!(a < b);
    }
}
