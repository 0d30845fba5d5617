//! The injected field-element hash oracle.
//!
//! `H : seq<F> -> F` is supplied by the caller; this crate only ever calls
//! it with 2 or 3 inputs (leaf hashing is arity 3, internal-node and
//! size-binding hashing are arity 2). Errors from `H` propagate unchanged
//! as `IndexedMerkleError::HashError`.

use crate::field::FieldElement;

/// A fallible, pure field-element hash function.
///
/// Implementations must guarantee `hash(&[0, 0, 0])` is nonzero — if the
/// genesis leaf hashed to zero, the sparse zero-short-circuit rule would
/// be unable to distinguish the genesis leaf from an empty subtree. This
/// is a deployment constraint on the hash, not something this crate can
/// check.
pub trait FieldHasher {
    fn hash(&self, inputs: &[FieldElement]) -> anyhow::Result<FieldElement>;
}

impl<T: FieldHasher + ?Sized> FieldHasher for &T {
    fn hash(&self, inputs: &[FieldElement]) -> anyhow::Result<FieldElement> {
        (**self).hash(inputs)
    }
}

/// A small deterministic stand-in hash used by this crate's own tests and
/// property tests. It is not a real algebraic hash suitable for any proof
/// system — the caller is expected to supply one of those — but it is
/// pure, injective enough for small test trees, and satisfies
/// `hash(&[0,0,0]) != 0`.
#[cfg(any(test, feature = "fuzzing"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicTestHasher;

#[cfg(any(test, feature = "fuzzing"))]
impl FieldHasher for DeterministicTestHasher {
    fn hash(&self, inputs: &[FieldElement]) -> anyhow::Result<FieldElement> {
        // A folded multiply-add over small odd primes, offset by 1 so the
        // all-zero input never hashes to zero.
        const SALTS: [u64; 3] = [1_000_003, 1_000_033, 1_000_037];
        let mut acc: u64 = 1;
        for (i, fe) in inputs.iter().enumerate() {
            let salt = SALTS[i % SALTS.len()];
            let limb = fe.to_u64_saturating();
            acc = acc
                .wrapping_mul(salt)
                .wrapping_add(limb.wrapping_mul(salt).wrapping_add(1));
        }
        Ok(FieldElement::from_u64(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_leaf_hash_is_nonzero() {
        let h = DeterministicTestHasher;
        let zero = FieldElement::zero();
        let out = h.hash(&[zero.clone(), zero.clone(), zero]).unwrap();
        assert!(!out.is_zero());
    }

    #[test]
    fn hash_is_deterministic() {
        let h = DeterministicTestHasher;
        let a = FieldElement::from_u64(5);
        let b = FieldElement::from_u64(100);
        let c = FieldElement::from_u64(0);
        let out1 = h.hash(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let out2 = h.hash(&[a, b, c]).unwrap();
        assert_eq!(out1, out2);
    }
}
