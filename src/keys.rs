//! Storage key encoders.
//!
//! Three namespaces share the byte-lexicographic key space of the
//! underlying KV store, distinguished by a one-byte prefix. The leaf-record
//! namespace is keyed directly by the user key, left-padded to a fixed
//! width, so that the store's native `getLT` finds the low-nullifier leaf
//! without any side index.

use crate::errors::CodecError;
use crate::field::FieldElement;

const LEAF_PREFIX: u8 = 0x00;
const HASH_PREFIX: u8 = 0x01;
const SIZE_PREFIX: u8 = 0x02;

/// `0x00 || pad(key, fe_len)` — leaf record key.
pub fn leaf_key(key: &FieldElement, fe_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(1 + fe_len);
    out.push(LEAF_PREFIX);
    out.extend_from_slice(&key.to_padded_be_bytes(fe_len)?);
    Ok(out)
}

/// The smallest possible key in the leaf namespace, `0x00 || [0; fe_len]`.
/// Used as the exclusive upper bound passed to `getLT` when proving
/// exclusion of the genesis leaf itself has no predecessor.
pub fn leaf_key_lower_bound(fe_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; 1 + fe_len];
    out[0] = LEAF_PREFIX;
    out
}

/// The one-past-the-end key in the leaf namespace: `0x01` (the next
/// prefix). Passing this to `getLT` returns the maximum occupied leaf.
pub fn leaf_key_upper_bound() -> Vec<u8> {
    vec![HASH_PREFIX]
}

/// Recovers the user key from a leaf-record storage key produced by
/// [`leaf_key`].
pub fn leaf_key_to_field(raw: &[u8]) -> FieldElement {
    debug_assert_eq!(raw.first().copied(), Some(LEAF_PREFIX));
    FieldElement::from_be_bytes(&raw[1..])
}

/// `0x01 || position`, where `position = 2^(L+1) - 2^(level+1) + idx`.
/// `level = 0` is the root level, `level = depth` is the leaf level; this
/// layout packs each level's hashes into a contiguous range.
pub fn hash_key(idx: u64, level: u32, depth: u32) -> Vec<u8> {
    let total: u128 = 1u128 << (depth + 1);
    let start: u128 = 1u128 << (level + 1);
    let position = total - start + idx as u128;
    let position_fe = FieldElement::from_be_bytes(&position.to_be_bytes());
    let mut out = Vec::with_capacity(17);
    out.push(HASH_PREFIX);
    out.extend_from_slice(&position_fe.to_minimal_be_bytes());
    out
}

/// The single-byte size key, `0x02`.
pub fn size_key() -> Vec<u8> {
    vec![SIZE_PREFIX]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_key_has_expected_prefix_and_width() {
        let k = leaf_key(&FieldElement::from_u64(5), 32).unwrap();
        assert_eq!(k.len(), 33);
        assert_eq!(k[0], LEAF_PREFIX);
    }

    #[test]
    fn leaf_key_ordering_matches_numeric_ordering() {
        let a = leaf_key(&FieldElement::from_u64(3), 32).unwrap();
        let b = leaf_key(&FieldElement::from_u64(300), 32).unwrap();
        assert!(a < b);
    }

    #[test]
    fn leaf_key_round_trips_through_to_field() {
        let fe = FieldElement::from_u64(12345);
        let k = leaf_key(&fe, 32).unwrap();
        assert_eq!(leaf_key_to_field(&k), fe);
    }

    #[test]
    fn hash_key_has_expected_prefix() {
        // level 0 (root), idx 0, depth 8: total=2^9=512, start=2^1=2, position=510.
        let k = hash_key(0, 0, 8);
        assert_eq!(k[0], HASH_PREFIX);
    }

    #[test]
    fn hash_key_distinguishes_levels() {
        let a = hash_key(0, 0, 8);
        let b = hash_key(0, 1, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn namespaces_are_disjoint_by_prefix() {
        assert_ne!(leaf_key(&FieldElement::from_u64(1), 32).unwrap()[0], HASH_PREFIX);
        assert_ne!(size_key()[0], LEAF_PREFIX);
        assert_ne!(size_key()[0], HASH_PREFIX);
    }
}
