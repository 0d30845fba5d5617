use thiserror::Error;

use crate::field::FieldElement;

/// Failures from the leaf-record codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not enough data to deserialize {desired_type:}: needed {needed:}, found {remaining:}")]
    DataTooShort {
        remaining: usize,
        desired_type: &'static str,
        needed: usize,
    },
    #[error("field element does not fit in {width:} bytes: encoded length was {got:}")]
    FieldElementTooLarge { width: usize, got: usize },
    #[error("re-encoding a decoded node did not reproduce the original bytes")]
    NonCanonicalRoundTrip,
}

/// Failures from [`crate::proof::verify`] / [`crate::proof::verify_mutation`]
///. Kept separate from [`IndexedMerkleError`] since proof
/// verification never touches the KV store or the generic store error type.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProofError {
    #[error("self-identity discipline violated: lowKey == key is {actual:}, but inclusion flag is {expected:}")]
    SelfIdentityMismatch { expected: bool, actual: bool },
    #[error("distinctness check failed: key equals nextKey")]
    KeyEqualsNextKey,
    #[error("ordering check failed: lowKey is not <= key")]
    LowKeyNotLessEqualKey,
    #[error("ordering check failed: key is not <= nextKey (and nextKey is not the sentinel)")]
    KeyNotLessEqualNextKey,
    #[error("recomputed root does not match the claimed root")]
    RootMismatch,
    #[error("mutation witness inconsistent: old and new leaf writes did not converge to one root")]
    DivergentMutationPaths,
    #[error("mutation witness has a size that does not follow oldSize + (not update)")]
    BadSizeTransition,
}

/// Top-level error type returned by every fallible operation on [`crate::tree::Tree`]
/// and [`crate::tree::Txn`]. Generic over the backing store's own error type so a
/// storage failure is never flattened into a string.
#[derive(Debug, Error)]
pub enum IndexedMerkleError<E: std::error::Error + Send + Sync + 'static> {
    /// `get` on a key with no leaf.
    #[error("key {0} not found")]
    KeyNotFound(FieldElement),

    /// `insert` on a key that already has a leaf.
    #[error("key {0} already exists")]
    KeyExists(FieldElement),

    /// Leaf-record codec failure.
    #[error(transparent)]
    MalformedRecord(#[from] CodecError),

    /// `insert` attempted to assign `index >= 2^L`.
    #[error("tree is over capacity: depth {depth:} allows at most {capacity:} leaves")]
    OverCapacity { depth: u32, capacity: u64 },

    /// Double-commit, use-after-discard, or any other transaction-state misuse.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(&'static str),

    /// Propagated from the KV store.
    #[error("storage error: {0}")]
    StorageError(#[source] E),

    /// Propagated from the injected hash oracle.
    #[error("hash oracle error: {0}")]
    HashError(#[source] anyhow::Error),

    /// A proof or mutation witness failed verification.
    #[error("proof invalid: {0}")]
    ProofInvalid(#[from] ProofError),
}
