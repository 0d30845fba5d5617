//! Leaf records and their codec.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
#[cfg(any(test, feature = "fuzzing"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

use crate::errors::CodecError;
use crate::field::FieldElement;
use crate::hasher::FieldHasher;

/// A leaf record, `(key, index, value, nextKey)`.
///
/// `key` is not part of the in-memory struct's encoded payload: it is the
/// storage-key suffix (see `keys::leaf_key`), so `Node` carries it only
/// for the caller's convenience when assembling proofs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "fuzzing"), derive(Arbitrary))]
pub struct Node {
    pub key: FieldElement,
    pub index: u64,
    pub value: FieldElement,
    pub next_key: FieldElement,
}

impl Node {
    /// The virtual genesis leaf `(0, 0, 0, 0)`.
    pub fn genesis() -> Self {
        Node {
            key: FieldElement::zero(),
            index: 0,
            value: FieldElement::zero(),
            next_key: FieldElement::zero(),
        }
    }

    /// `leafH = H(key, value, nextKey)`. The index is deliberately excluded.
    pub fn hash(&self, hasher: &impl FieldHasher) -> anyhow::Result<FieldElement> {
        hasher.hash(&[self.key.clone(), self.value.clone(), self.next_key.clone()])
    }

    /// Encodes the payload (everything but `key`) as
    /// `[index:8 BE][len(value):1][value][len(nextKey):1][nextKey]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u64::<BigEndian>(self.index).expect("vec write cannot fail");
        let value = self.value.to_minimal_be_bytes();
        out.write_u8(value.len() as u8).expect("vec write cannot fail");
        out.extend_from_slice(&value);
        let next_key = self.next_key.to_minimal_be_bytes();
        out.write_u8(next_key.len() as u8).expect("vec write cannot fail");
        out.extend_from_slice(&next_key);
        out
    }

    /// Decodes a payload produced by [`Node::encode`]; `key` must be supplied
    /// separately since it is not part of the payload (it came from the
    /// storage key).
    pub fn decode(key: FieldElement, bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Cursor::new(bytes);
        let index = reader
            .read_u64::<BigEndian>()
            .map_err(|_| CodecError::DataTooShort {
                remaining: bytes.len(),
                desired_type: "Node::index",
                needed: 8,
            })?;

        let value_len = reader
            .read_u8()
            .map_err(|_| CodecError::DataTooShort {
                remaining: bytes.len().saturating_sub(8),
                desired_type: "Node::value length",
                needed: 1,
            })? as usize;
        let mut value_buf = vec![0u8; value_len];
        reader
            .read_exact(&mut value_buf)
            .map_err(|_| CodecError::DataTooShort {
                remaining: bytes.len().saturating_sub(9),
                desired_type: "Node::value",
                needed: value_len,
            })?;
        if value_buf.first() == Some(&0) {
            // A minimal big-endian encoding never carries a leading zero
            // byte; re-encoding this would produce a shorter length byte.
            return Err(CodecError::NonCanonicalRoundTrip);
        }

        let next_key_len = reader
            .read_u8()
            .map_err(|_| CodecError::DataTooShort {
                remaining: bytes.len().saturating_sub(9 + value_len),
                desired_type: "Node::nextKey length",
                needed: 1,
            })? as usize;
        let mut next_key_buf = vec![0u8; next_key_len];
        reader
            .read_exact(&mut next_key_buf)
            .map_err(|_| CodecError::DataTooShort {
                remaining: bytes.len().saturating_sub(10 + value_len),
                desired_type: "Node::nextKey",
                needed: next_key_len,
            })?;
        if next_key_buf.first() == Some(&0) {
            return Err(CodecError::NonCanonicalRoundTrip);
        }

        if reader.position() != bytes.len() as u64 {
            // Trailing bytes beyond the encoded fields would also be
            // dropped by a re-encode, breaking the codec's canonical
            // round-trip guarantee (§4.3).
            return Err(CodecError::NonCanonicalRoundTrip);
        }

        Ok(Node {
            key,
            index,
            value: FieldElement::from_be_bytes(&value_buf),
            next_key: FieldElement::from_be_bytes(&next_key_buf),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_all_zero() {
        let g = Node::genesis();
        assert!(g.key.is_zero());
        assert_eq!(g.index, 0);
        assert!(g.value.is_zero());
        assert!(g.next_key.is_zero());
    }

    #[test]
    fn codec_round_trips() {
        let n = Node {
            key: FieldElement::from_u64(5),
            index: 7,
            value: FieldElement::from_u64(100),
            next_key: FieldElement::from_u64(9),
        };
        let bytes = n.encode();
        let decoded = Node::decode(n.key.clone(), &bytes).unwrap();
        assert_eq!(decoded, n);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn codec_round_trips_zero_fields() {
        let n = Node {
            key: FieldElement::from_u64(1),
            index: 0,
            value: FieldElement::zero(),
            next_key: FieldElement::zero(),
        };
        let bytes = n.encode();
        let decoded = Node::decode(n.key.clone(), &bytes).unwrap();
        assert_eq!(decoded, n);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn truncated_input_is_malformed() {
        let n = Node {
            key: FieldElement::from_u64(5),
            index: 7,
            value: FieldElement::from_u64(100),
            next_key: FieldElement::from_u64(9),
        };
        let mut bytes = n.encode();
        bytes.truncate(bytes.len() - 1);
        assert!(Node::decode(n.key, &bytes).is_err());
    }

    #[test]
    fn leading_zero_byte_in_value_is_rejected_as_non_canonical() {
        // index:8 BE, len(value)=1, value=[0], len(nextKey)=0
        let mut bytes = vec![0u8; 8];
        bytes.push(1);
        bytes.push(0);
        bytes.push(0);
        let err = Node::decode(FieldElement::from_u64(5), &bytes).unwrap_err();
        assert!(matches!(err, CodecError::NonCanonicalRoundTrip));
    }

    #[test]
    fn trailing_bytes_are_rejected_as_non_canonical() {
        let n = Node {
            key: FieldElement::from_u64(5),
            index: 7,
            value: FieldElement::from_u64(100),
            next_key: FieldElement::from_u64(9),
        };
        let mut bytes = n.encode();
        bytes.push(0xff);
        let err = Node::decode(n.key, &bytes).unwrap_err();
        assert!(matches!(err, CodecError::NonCanonicalRoundTrip));
    }
}
