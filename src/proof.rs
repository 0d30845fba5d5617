//! The proof verifier.
//!
//! Pure functions, replicated bit-for-bit by whatever constraint-system
//! embedding consumes this crate. Grounded on
//! `circuits/imt/verify.go::Verify.Run` and `circuits/imt/mutate.go`.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
#[cfg(any(test, feature = "fuzzing"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

use crate::errors::{CodecError, ProofError};
use crate::field::FieldElement;
use crate::hasher::FieldHasher;
use crate::node::Node;

/// An inclusion or exclusion proof: a leaf, its sibling vector, and the
/// published root/size it should recompute to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "fuzzing"), derive(Arbitrary))]
pub struct Proof {
    pub root: FieldElement,
    pub size: u64,
    pub node: Node,
    /// `siblings[level]` is the sibling encountered ascending from
    /// `level + 1` to `level`; length `depth`.
    pub siblings: Vec<FieldElement>,
}

impl Proof {
    /// Fixed wire format: `Root, Size, node.key, node.index, node.value,
    /// node.nextKey, siblings[0..depth)`. Field elements are `fe_len`-byte
    /// big-endian; `size`/`index` are 8-byte big-endian.
    pub fn to_bytes(&self, fe_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.root.to_padded_be_bytes(fe_len)?);
        out.write_u64::<BigEndian>(self.size)
            .expect("vec write cannot fail");
        out.extend_from_slice(&self.node.key.to_padded_be_bytes(fe_len)?);
        out.write_u64::<BigEndian>(self.node.index)
            .expect("vec write cannot fail");
        out.extend_from_slice(&self.node.value.to_padded_be_bytes(fe_len)?);
        out.extend_from_slice(&self.node.next_key.to_padded_be_bytes(fe_len)?);
        for s in &self.siblings {
            out.extend_from_slice(&s.to_padded_be_bytes(fe_len)?);
        }
        Ok(out)
    }

    /// Inverse of [`Proof::to_bytes`]. `depth` fixes the expected
    /// sibling-vector length (not itself encoded in the wire format).
    pub fn from_bytes(bytes: &[u8], fe_len: usize, depth: u32) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let root = read_fe(&mut cursor, fe_len, "Proof::root")?;
        let size = read_u64(&mut cursor, "Proof::size")?;
        let key = read_fe(&mut cursor, fe_len, "Proof::node.key")?;
        let index = read_u64(&mut cursor, "Proof::node.index")?;
        let value = read_fe(&mut cursor, fe_len, "Proof::node.value")?;
        let next_key = read_fe(&mut cursor, fe_len, "Proof::node.nextKey")?;
        let mut siblings = Vec::with_capacity(depth as usize);
        for _ in 0..depth {
            siblings.push(read_fe(&mut cursor, fe_len, "Proof::siblings")?);
        }
        Ok(Proof {
            root,
            size,
            node: Node {
                key,
                index,
                value,
                next_key,
            },
            siblings,
        })
    }
}

/// A single leaf write as replayed by the verifier: the values that go
/// into the leaf hash, plus the sibling vector for its path.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "fuzzing"), derive(Arbitrary))]
pub struct LeafWrite {
    pub key: FieldElement,
    pub index: u64,
    pub value: FieldElement,
    pub next_key: FieldElement,
    pub siblings: Vec<FieldElement>,
}

/// Everything needed to re-derive and check both the old and new root of a
/// single mutation. Mirrors what a verifying circuit
/// consumes: the pre-image leaf, sibling vectors before and after, and a
/// discriminator bit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "fuzzing"), derive(Arbitrary))]
pub struct MutationWitness {
    pub update: bool,
    pub old_root: FieldElement,
    pub old_size: u64,
    /// The pre-mutation witness leaf: for updates, the leaf itself
    /// (`inclusion = 1`); for inserts, the low-nullifier leaf `Lo`
    /// (`inclusion = 0`).
    pub old_leaf: LeafWrite,
    pub new_root: FieldElement,
    pub new_size: u64,
    /// The leaf actually being inserted/updated.
    pub new_leaf: LeafWrite,
    /// For inserts, the low-nullifier leaf after its `nextKey` is
    /// rewritten to point at the new key. `None` for updates, where only
    /// one leaf is touched.
    pub low_leaf_after: Option<LeafWrite>,
}

impl LeafWrite {
    /// Same per-field encoding as [`Proof::to_bytes`], without the
    /// `root`/`size` prefix (those belong to the enclosing witness).
    pub fn to_bytes(&self, fe_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.key.to_padded_be_bytes(fe_len)?);
        out.write_u64::<BigEndian>(self.index)
            .expect("vec write cannot fail");
        out.extend_from_slice(&self.value.to_padded_be_bytes(fe_len)?);
        out.extend_from_slice(&self.next_key.to_padded_be_bytes(fe_len)?);
        for s in &self.siblings {
            out.extend_from_slice(&s.to_padded_be_bytes(fe_len)?);
        }
        Ok(out)
    }

    fn from_bytes(
        cursor: &mut Cursor<&[u8]>,
        fe_len: usize,
        depth: u32,
    ) -> Result<Self, CodecError> {
        let key = read_fe(cursor, fe_len, "LeafWrite::key")?;
        let index = read_u64(cursor, "LeafWrite::index")?;
        let value = read_fe(cursor, fe_len, "LeafWrite::value")?;
        let next_key = read_fe(cursor, fe_len, "LeafWrite::nextKey")?;
        let mut siblings = Vec::with_capacity(depth as usize);
        for _ in 0..depth {
            siblings.push(read_fe(cursor, fe_len, "LeafWrite::siblings")?);
        }
        Ok(LeafWrite {
            key,
            index,
            value,
            next_key,
            siblings,
        })
    }
}

impl MutationWitness {
    /// Wire format in the same spirit as [`Proof::to_bytes`]: `update` as a
    /// single byte, then `old_root`/`old_size`/`old_leaf`,
    /// `new_root`/`new_size`/`new_leaf`, then a presence byte and
    /// optionally `low_leaf_after`.
    pub fn to_bytes(&self, fe_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        out.push(self.update as u8);
        out.extend_from_slice(&self.old_root.to_padded_be_bytes(fe_len)?);
        out.write_u64::<BigEndian>(self.old_size)
            .expect("vec write cannot fail");
        out.extend_from_slice(&self.old_leaf.to_bytes(fe_len)?);
        out.extend_from_slice(&self.new_root.to_padded_be_bytes(fe_len)?);
        out.write_u64::<BigEndian>(self.new_size)
            .expect("vec write cannot fail");
        out.extend_from_slice(&self.new_leaf.to_bytes(fe_len)?);
        match &self.low_leaf_after {
            Some(l) => {
                out.push(1);
                out.extend_from_slice(&l.to_bytes(fe_len)?);
            }
            None => out.push(0),
        }
        Ok(out)
    }

    /// Inverse of [`MutationWitness::to_bytes`]. `depth` fixes the expected
    /// sibling-vector length of each embedded [`LeafWrite`].
    pub fn from_bytes(bytes: &[u8], fe_len: usize, depth: u32) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let update = read_u8(&mut cursor, "MutationWitness::update")? != 0;
        let old_root = read_fe(&mut cursor, fe_len, "MutationWitness::old_root")?;
        let old_size = read_u64(&mut cursor, "MutationWitness::old_size")?;
        let old_leaf = LeafWrite::from_bytes(&mut cursor, fe_len, depth)?;
        let new_root = read_fe(&mut cursor, fe_len, "MutationWitness::new_root")?;
        let new_size = read_u64(&mut cursor, "MutationWitness::new_size")?;
        let new_leaf = LeafWrite::from_bytes(&mut cursor, fe_len, depth)?;
        let has_low = read_u8(&mut cursor, "MutationWitness::low_leaf_after flag")?;
        let low_leaf_after = if has_low != 0 {
            Some(LeafWrite::from_bytes(&mut cursor, fe_len, depth)?)
        } else {
            None
        };
        Ok(MutationWitness {
            update,
            old_root,
            old_size,
            old_leaf,
            new_root,
            new_size,
            new_leaf,
            low_leaf_after,
        })
    }
}

/// Reads a `fe_len`-byte field element off `cursor`, mapping a short read to
/// `CodecError::DataTooShort` with the remaining-bytes count for diagnostics.
fn read_fe(
    cursor: &mut Cursor<&[u8]>,
    fe_len: usize,
    desired_type: &'static str,
) -> Result<FieldElement, CodecError> {
    let remaining = (cursor.get_ref().len() as u64).saturating_sub(cursor.position()) as usize;
    let mut buf = vec![0u8; fe_len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::DataTooShort {
            remaining,
            desired_type,
            needed: fe_len,
        })?;
    Ok(FieldElement::from_be_bytes(&buf))
}

fn read_u64(cursor: &mut Cursor<&[u8]>, desired_type: &'static str) -> Result<u64, CodecError> {
    let remaining = (cursor.get_ref().len() as u64).saturating_sub(cursor.position()) as usize;
    cursor
        .read_u64::<BigEndian>()
        .map_err(|_| CodecError::DataTooShort {
            remaining,
            desired_type,
            needed: 8,
        })
}

fn read_u8(cursor: &mut Cursor<&[u8]>, desired_type: &'static str) -> Result<u8, CodecError> {
    let remaining = (cursor.get_ref().len() as u64).saturating_sub(cursor.position()) as usize;
    cursor
        .read_u8()
        .map_err(|_| CodecError::DataTooShort {
            remaining,
            desired_type,
            needed: 1,
        })
}

/// Computes bit `i` (0 = LSB) of `index`. Shared with the writer's path
/// rewrite (`tree::set_node`), which must use the identical convention.
pub(crate) fn index_bit(index: u64, i: u32) -> bool {
    (index >> i) & 1 == 1
}

/// Recomputes the top hash by walking `siblings` top-down: `(left, right) = (h, s)` if bit is 0 else `(s, h)`; sparse
/// zero-short-circuit applies.
fn recompute_top_hash(
    leaf_hash: FieldElement,
    index: u64,
    siblings: &[FieldElement],
    hasher: &impl FieldHasher,
) -> anyhow::Result<FieldElement> {
    let depth = siblings.len() as u32;
    let mut h = leaf_hash;
    for i in 0..depth {
        let level = depth - 1 - i;
        let s = &siblings[level as usize];
        let b = index_bit(index, i);
        if s.is_zero() {
            continue;
        }
        let (left, right) = if !b {
            (h.clone(), s.clone())
        } else {
            (s.clone(), h.clone())
        };
        h = hasher.hash(&[left, right])?;
    }
    Ok(h)
}

/// Verifies an inclusion or exclusion proof.
///
/// `query_key` is the key the caller originally asked about; for
/// inclusion, `proof.node.key == query_key`. For exclusion, `proof.node`
/// is the low-nullifier leaf `Lo`, and the caller is additionally
/// expected to check `Lo.key < query_key` and (`Lo.nextKey == 0` or
/// `query_key < Lo.nextKey`) — steps 1-3 below enforce exactly that via
/// the `inclusion` flag and the wrap-aware upper bound.
pub fn verify(
    proof: &Proof,
    query_key: &FieldElement,
    inclusion: bool,
    hasher: &impl FieldHasher,
) -> Result<(), ProofError> {
    let result = verify_inner(proof, query_key, inclusion, hasher);
    crate::metrics::record_proof_verify(result.is_ok());
    result
}

fn verify_inner(
    proof: &Proof,
    query_key: &FieldElement,
    inclusion: bool,
    hasher: &impl FieldHasher,
) -> Result<(), ProofError> {
    let low_key = &proof.node.key;
    let next_key = &proof.node.next_key;

    // 1. Self-identity discipline.
    let eq = low_key == query_key;
    if eq != inclusion {
        return Err(ProofError::SelfIdentityMismatch {
            expected: inclusion,
            actual: eq,
        });
    }

    // 2. Distinctness.
    if query_key == next_key {
        return Err(ProofError::KeyEqualsNextKey);
    }

    // 3. Ordering. next_key == 0 is the sentinel meaning "upper bound is
    // p-1". This crate compares over F's total order rather than a
    // circuit's `nextKey - [nextKey == 0]` algebraic expression, since
    // constraint-system embedding is out of scope.
    if low_key > query_key {
        return Err(ProofError::LowKeyNotLessEqualKey);
    }
    if !next_key.is_zero() && query_key > next_key {
        return Err(ProofError::KeyNotLessEqualNextKey);
    }

    // 4. Root recomputation.
    let leaf_hash = hasher
        .hash(&[low_key.clone(), proof.node.value.clone(), next_key.clone()])
        .map_err(|_| ProofError::RootMismatch)?;
    let top_hash = recompute_top_hash(leaf_hash, proof.node.index, &proof.siblings, hasher)
        .map_err(|_| ProofError::RootMismatch)?;
    let size_fe = FieldElement::from_u64(proof.size);
    let recomputed_root = hasher
        .hash(&[top_hash, size_fe])
        .map_err(|_| ProofError::RootMismatch)?;

    // 5. Equality.
    if recomputed_root != proof.root {
        return Err(ProofError::RootMismatch);
    }
    Ok(())
}

fn verify_leaf_write_root(
    write: &LeafWrite,
    hasher: &impl FieldHasher,
) -> anyhow::Result<FieldElement> {
    let leaf_hash = hasher.hash(&[
        write.key.clone(),
        write.value.clone(),
        write.next_key.clone(),
    ])?;
    recompute_top_hash(leaf_hash, write.index, &write.siblings, hasher)
}

/// Verifies a mutation witness.
pub fn verify_mutation(w: &MutationWitness, hasher: &impl FieldHasher) -> Result<(), ProofError> {
    let result = verify_mutation_inner(w, hasher);
    crate::metrics::record_proof_verify(result.is_ok());
    result
}

fn verify_mutation_inner(w: &MutationWitness, hasher: &impl FieldHasher) -> Result<(), ProofError> {
    // (a) Inclusion verifier over the old state.
    let old_proof = Proof {
        root: w.old_root.clone(),
        size: w.old_size,
        node: Node {
            key: w.old_leaf.key.clone(),
            index: w.old_leaf.index,
            value: w.old_leaf.value.clone(),
            next_key: w.old_leaf.next_key.clone(),
        },
        siblings: w.old_leaf.siblings.clone(),
    };
    let query_key = if w.update {
        w.old_leaf.key.clone()
    } else {
        w.new_leaf.key.clone()
    };
    verify_inner(&old_proof, &query_key, w.update, hasher)?;

    // (b) Expected size transition: newSize = oldSize + [not update].
    let expected_new_size = w.old_size + if w.update { 0 } else { 1 };
    if w.new_size != expected_new_size {
        return Err(ProofError::BadSizeTransition);
    }

    // (c) The simultaneous leaf write(s) must converge to one new root.
    let new_top_hash = if w.update {
        // The two leaves coincide; only one path is recomputed.
        verify_leaf_write_root(&w.new_leaf, hasher).map_err(|_| ProofError::DivergentMutationPaths)?
    } else {
        let low_leaf_after = w
            .low_leaf_after
            .as_ref()
            .ok_or(ProofError::DivergentMutationPaths)?;
        let new_leaf_top = verify_leaf_write_root(&w.new_leaf, hasher)
            .map_err(|_| ProofError::DivergentMutationPaths)?;
        let low_leaf_top = verify_leaf_write_root(low_leaf_after, hasher)
            .map_err(|_| ProofError::DivergentMutationPaths)?;
        if new_leaf_top != low_leaf_top {
            return Err(ProofError::DivergentMutationPaths);
        }
        new_leaf_top
    };

    let size_fe = FieldElement::from_u64(w.new_size);
    let recomputed_new_root = hasher
        .hash(&[new_top_hash, size_fe])
        .map_err(|_| ProofError::RootMismatch)?;
    if recomputed_new_root != w.new_root {
        return Err(ProofError::RootMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::DeterministicTestHasher;

    fn genesis_root(hasher: &impl FieldHasher) -> FieldElement {
        let leaf_hash = hasher
            .hash(&[
                FieldElement::zero(),
                FieldElement::zero(),
                FieldElement::zero(),
            ])
            .unwrap();
        hasher.hash(&[leaf_hash, FieldElement::zero()]).unwrap()
    }

    #[test]
    fn empty_tree_exclusion_proof_verifies() {
        let hasher = DeterministicTestHasher;
        let root = genesis_root(&hasher);
        let proof = Proof {
            root,
            size: 0,
            node: Node::genesis(),
            siblings: vec![FieldElement::zero(); 8],
        };
        verify(&proof, &FieldElement::from_u64(5), false, &hasher).unwrap();
    }

    #[test]
    fn self_identity_mismatch_is_rejected() {
        let hasher = DeterministicTestHasher;
        let root = genesis_root(&hasher);
        let proof = Proof {
            root,
            size: 0,
            node: Node::genesis(),
            siblings: vec![FieldElement::zero(); 8],
        };
        // Claiming inclusion for a key that doesn't match the witnessed leaf.
        assert!(verify(&proof, &FieldElement::from_u64(5), true, &hasher).is_err());
    }

    #[test]
    fn wrong_root_is_rejected() {
        let hasher = DeterministicTestHasher;
        let proof = Proof {
            root: FieldElement::from_u64(999),
            size: 0,
            node: Node::genesis(),
            siblings: vec![FieldElement::zero(); 8],
        };
        assert!(verify(&proof, &FieldElement::from_u64(5), false, &hasher).is_err());
    }

    #[test]
    fn proof_wire_format_round_trips() {
        let proof = Proof {
            root: FieldElement::from_u64(12345),
            size: 3,
            node: Node {
                key: FieldElement::from_u64(5),
                index: 1,
                value: FieldElement::from_u64(100),
                next_key: FieldElement::zero(),
            },
            siblings: (0..8).map(FieldElement::from_u64).collect(),
        };
        let bytes = proof.to_bytes(32).unwrap();
        let decoded = Proof::from_bytes(&bytes, 32, 8).unwrap();
        assert_eq!(decoded.root, proof.root);
        assert_eq!(decoded.size, proof.size);
        assert_eq!(decoded.node, proof.node);
        assert_eq!(decoded.siblings, proof.siblings);
    }

    #[test]
    fn proof_wire_format_rejects_truncated_input() {
        let proof = Proof {
            root: FieldElement::from_u64(1),
            size: 0,
            node: Node::genesis(),
            siblings: vec![FieldElement::zero(); 8],
        };
        let mut bytes = proof.to_bytes(32).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(Proof::from_bytes(&bytes, 32, 8).is_err());
    }

    #[test]
    fn mutation_witness_wire_format_round_trips_insert_and_update() {
        let leaf = |k: u64| LeafWrite {
            key: FieldElement::from_u64(k),
            index: k,
            value: FieldElement::from_u64(k * 10),
            next_key: FieldElement::zero(),
            siblings: vec![FieldElement::zero(); 4],
        };
        let insert_witness = MutationWitness {
            update: false,
            old_root: FieldElement::from_u64(1),
            old_size: 0,
            old_leaf: leaf(0),
            new_root: FieldElement::from_u64(2),
            new_size: 1,
            new_leaf: leaf(5),
            low_leaf_after: Some(leaf(0)),
        };
        let bytes = insert_witness.to_bytes(32).unwrap();
        let decoded = MutationWitness::from_bytes(&bytes, 32, 4).unwrap();
        assert_eq!(decoded.update, insert_witness.update);
        assert_eq!(decoded.old_root, insert_witness.old_root);
        assert_eq!(decoded.new_leaf.key, insert_witness.new_leaf.key);
        assert!(decoded.low_leaf_after.is_some());

        let update_witness = MutationWitness {
            update: true,
            old_root: FieldElement::from_u64(1),
            old_size: 1,
            old_leaf: leaf(5),
            new_root: FieldElement::from_u64(3),
            new_size: 1,
            new_leaf: leaf(5),
            low_leaf_after: None,
        };
        let bytes = update_witness.to_bytes(32).unwrap();
        let decoded = MutationWitness::from_bytes(&bytes, 32, 4).unwrap();
        assert!(decoded.low_leaf_after.is_none());
        assert_eq!(decoded.new_root, update_witness.new_root);
    }
}
