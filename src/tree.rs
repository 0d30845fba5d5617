//! The public `Tree`/`Txn` facade: opening a tree, reading roots/leaves,
//! assembling proofs, and the `insert`/`update`/`commit`/`discard` writer
//! state machine.

use tracing::{debug, trace, warn};

use crate::errors::IndexedMerkleError;
use crate::field::FieldElement;
use crate::hasher::FieldHasher;
use crate::keys::{hash_key, leaf_key, leaf_key_to_field, size_key};
use crate::metrics;
use crate::node::Node;
use crate::proof::{index_bit, LeafWrite, MutationWitness, Proof};
use crate::store::Transaction;

/// Opens a tree view over a store, fixing the tree's depth, field-element
/// width, and hash oracle for the lifetime of this handle.
pub struct Tree<S, H> {
    store: S,
    depth: u32,
    fe_len: usize,
    hasher: H,
}

/// Opens a tree: `open(store, depth, feLen, hash) -> Tree`.
pub fn open<S, H>(store: S, depth: u32, fe_len: usize, hasher: H) -> Tree<S, H> {
    Tree {
        store,
        depth,
        fe_len,
        hasher,
    }
}

impl<S, H> Tree<S, H>
where
    S: StoreHandle,
    H: FieldHasher,
{
    /// Computes the current root, `H(topHash, size)`.
    pub fn root(&self) -> Result<FieldElement, IndexedMerkleError<<S::Txn as Transaction>::Error>> {
        let txn = self.store.begin();
        read_root(&txn, self.depth, &self.hasher)
    }

    /// The persisted leaf count, or `0` for a fresh tree.
    pub fn size(&self) -> Result<u64, IndexedMerkleError<<S::Txn as Transaction>::Error>> {
        let txn = self.store.begin();
        read_size(&txn)
    }

    /// Looks up a leaf's value by key.
    pub fn get(
        &self,
        key: &FieldElement,
    ) -> Result<FieldElement, IndexedMerkleError<<S::Txn as Transaction>::Error>> {
        let txn = self.store.begin();
        let node = read_leaf(&txn, key, self.fe_len)?
            .ok_or_else(|| IndexedMerkleError::KeyNotFound(key.clone()))?;
        Ok(node.value)
    }

    /// Assembles an inclusion proof for `key`.
    pub fn prove_inclusion(
        &self,
        key: &FieldElement,
    ) -> Result<Proof, IndexedMerkleError<<S::Txn as Transaction>::Error>> {
        let txn = self.store.begin();
        let node = read_leaf(&txn, key, self.fe_len)?
            .ok_or_else(|| IndexedMerkleError::KeyNotFound(key.clone()))?;
        let root = read_root(&txn, self.depth, &self.hasher)?;
        let size = read_size(&txn)?;
        let siblings = gather_siblings(&txn, node.index, self.depth)?;
        Ok(Proof {
            root,
            size,
            node,
            siblings,
        })
    }

    /// Assembles an exclusion proof for `key`: the low-nullifier leaf, or
    /// the genesis leaf if `key` is smaller than every occupied key.
    pub fn prove_exclusion(
        &self,
        key: &FieldElement,
    ) -> Result<Proof, IndexedMerkleError<<S::Txn as Transaction>::Error>> {
        let txn = self.store.begin();
        let node = read_low_nullifier(&txn, key, self.fe_len)?;
        let root = read_root(&txn, self.depth, &self.hasher)?;
        let size = read_size(&txn)?;
        let siblings = gather_siblings(&txn, node.index, self.depth)?;
        Ok(Proof {
            root,
            size,
            node,
            siblings,
        })
    }

    /// Opens a write transaction.
    pub fn begin(&self) -> Txn<'_, S::Txn, H> {
        Txn {
            store_txn: self.store.begin(),
            depth: self.depth,
            fe_len: self.fe_len,
            hasher: &self.hasher,
            state: TxnState::Fresh,
        }
    }
}

/// Abstracts "a thing that can hand out fresh transactions", so `Tree`'s
/// read methods and `Txn`'s write methods share one underlying connection
/// type without `Tree` itself needing to be generic over a single
/// long-lived transaction.
pub trait StoreHandle {
    type Txn: Transaction;
    fn begin(&self) -> Self::Txn;
}

impl StoreHandle for crate::store::MemStore {
    type Txn = crate::store::MemStoreTxn;
    fn begin(&self) -> Self::Txn {
        crate::store::MemStore::begin(self)
    }
}

/// Writer state machine: `Fresh -> Mutated -> Committed |
/// Discarded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Fresh,
    Mutated,
    Committed,
    Discarded,
}

/// A mutable handle on the tree. `set`/`insert`/`update` advance the
/// writer state machine; `commit`/`discard` are terminal.
pub struct Txn<'a, T, H> {
    store_txn: T,
    depth: u32,
    fe_len: usize,
    hasher: &'a H,
    state: TxnState,
}

impl<'a, T, H> Txn<'a, T, H>
where
    T: Transaction,
    H: FieldHasher,
{
    fn require_writable(&self) -> Result<(), IndexedMerkleError<T::Error>> {
        match self.state {
            TxnState::Committed => Err(IndexedMerkleError::InvalidTransaction(
                "transaction already committed",
            )),
            TxnState::Discarded => Err(IndexedMerkleError::InvalidTransaction(
                "transaction already discarded",
            )),
            TxnState::Fresh | TxnState::Mutated => Ok(()),
        }
    }

    /// `set(key, value)`: inserts if absent, otherwise updates in place.
    pub fn set(
        &mut self,
        key: &FieldElement,
        value: &FieldElement,
    ) -> Result<MutationWitness, IndexedMerkleError<T::Error>> {
        self.require_writable()?;
        match read_leaf(&self.store_txn, key, self.fe_len)? {
            Some(node) => self.update_with(key, value, node),
            None => self.insert_with(key, value, None),
        }
    }

    /// Inserts a new leaf, splicing it into the sorted linked list after
    /// its low-nullifier leaf.
    pub fn insert(
        &mut self,
        key: &FieldElement,
        value: &FieldElement,
    ) -> Result<MutationWitness, IndexedMerkleError<T::Error>> {
        self.require_writable()?;
        let existing = read_leaf(&self.store_txn, key, self.fe_len)?;
        self.insert_with(key, value, existing)
    }

    /// Shared `insert` body. `existing` is whatever the caller already knows
    /// about `key` (`set` has just read it; a bare `insert` call reads it
    /// fresh), so the duplicate-key check never issues a second read of the
    /// same leaf within one call.
    fn insert_with(
        &mut self,
        key: &FieldElement,
        value: &FieldElement,
        existing: Option<Node>,
    ) -> Result<MutationWitness, IndexedMerkleError<T::Error>> {
        if existing.is_some() {
            warn!(key = %key, "insert rejected: key already exists");
            return Err(IndexedMerkleError::KeyExists(key.clone()));
        }

        let low = read_low_nullifier(&self.store_txn, key, self.fe_len)?;
        let old_root = read_root(&self.store_txn, self.depth, self.hasher)?;
        let old_size = read_size(&self.store_txn)?;
        let old_low_siblings = gather_siblings(&self.store_txn, low.index, self.depth)?;

        let new_index = old_size + 1;
        set_size(&mut self.store_txn, new_index)?;

        let new_leaf = Node {
            key: key.clone(),
            index: new_index,
            value: value.clone(),
            next_key: low.next_key.clone(),
        };
        // The sibling vector `set_node` returns here is the one walked
        // *before* `low_after`'s path below is rewritten, so at the level
        // where the two paths share an ancestor it is already stale (it
        // still reflects the pre-mutation subtree). Discard it; the
        // correct vector is re-gathered fresh after `low_after` is written.
        set_node(
            &mut self.store_txn,
            &new_leaf,
            self.fe_len,
            self.depth,
            self.hasher,
        )?;

        let low_after = Node {
            key: low.key.clone(),
            index: low.index,
            value: low.value.clone(),
            next_key: key.clone(),
        };
        let low_siblings = set_node(
            &mut self.store_txn,
            &low_after,
            self.fe_len,
            self.depth,
            self.hasher,
        )?;
        let new_leaf_siblings = gather_siblings(&self.store_txn, new_leaf.index, self.depth)?;

        let new_root = read_root(&self.store_txn, self.depth, self.hasher)?;
        self.state = TxnState::Mutated;
        metrics::set_leaf_count(new_index);
        metrics::inc_inserts();
        trace!(key = %key, index = new_index, "insert staged");

        Ok(MutationWitness {
            update: false,
            old_root,
            old_size,
            old_leaf: LeafWrite {
                key: low.key,
                index: low.index,
                value: low.value,
                next_key: low.next_key,
                siblings: old_low_siblings,
            },
            new_root,
            new_size: new_index,
            new_leaf: LeafWrite {
                key: new_leaf.key,
                index: new_leaf.index,
                value: new_leaf.value,
                next_key: new_leaf.next_key,
                siblings: new_leaf_siblings,
            },
            low_leaf_after: Some(LeafWrite {
                key: low_after.key,
                index: low_after.index,
                value: low_after.value,
                next_key: low_after.next_key,
                siblings: low_siblings,
            }),
        })
    }

    /// Replaces a leaf's value in place; `key`, `index`, `nextKey` are
    /// preserved.
    pub fn update(
        &mut self,
        key: &FieldElement,
        value: &FieldElement,
    ) -> Result<MutationWitness, IndexedMerkleError<T::Error>> {
        self.require_writable()?;
        let node = read_leaf(&self.store_txn, key, self.fe_len)?
            .ok_or_else(|| IndexedMerkleError::KeyNotFound(key.clone()))?;
        self.update_with(key, value, node)
    }

    /// Shared `update` body. `node` is the leaf `key` already resolves to,
    /// supplied by the caller (`set` has just read it; a bare `update` call
    /// reads it fresh) so it is never fetched twice within one call.
    fn update_with(
        &mut self,
        key: &FieldElement,
        value: &FieldElement,
        node: Node,
    ) -> Result<MutationWitness, IndexedMerkleError<T::Error>> {
        let old_root = read_root(&self.store_txn, self.depth, self.hasher)?;
        let old_size = read_size(&self.store_txn)?;
        let old_value = node.value.clone();
        let old_siblings = gather_siblings(&self.store_txn, node.index, self.depth)?;

        let updated = Node {
            key: node.key.clone(),
            index: node.index,
            value: value.clone(),
            next_key: node.next_key.clone(),
        };
        let new_siblings = set_node(
            &mut self.store_txn,
            &updated,
            self.fe_len,
            self.depth,
            self.hasher,
        )?;
        let new_root = read_root(&self.store_txn, self.depth, self.hasher)?;
        self.state = TxnState::Mutated;
        metrics::inc_updates();
        trace!(key = %key, "update staged");

        Ok(MutationWitness {
            update: true,
            old_root,
            old_size,
            old_leaf: LeafWrite {
                key: node.key.clone(),
                index: node.index,
                value: old_value,
                next_key: node.next_key.clone(),
                siblings: old_siblings,
            },
            new_root,
            new_size: old_size,
            new_leaf: LeafWrite {
                key: updated.key,
                index: updated.index,
                value: updated.value,
                next_key: updated.next_key,
                siblings: new_siblings,
            },
            low_leaf_after: None,
        })
    }

    /// Commits all writes made through this transaction (terminal).
    pub fn commit(self) -> Result<(), IndexedMerkleError<T::Error>> {
        match self.state {
            TxnState::Committed => {
                return Err(IndexedMerkleError::InvalidTransaction(
                    "transaction already committed",
                ))
            }
            TxnState::Discarded => {
                return Err(IndexedMerkleError::InvalidTransaction(
                    "transaction already discarded",
                ))
            }
            TxnState::Fresh | TxnState::Mutated => {}
        }
        debug!("committing transaction");
        metrics::inc_commits();
        self.store_txn
            .commit()
            .map_err(IndexedMerkleError::StorageError)
    }

    /// Discards all writes made through this transaction (terminal).
    pub fn discard(self) -> Result<(), IndexedMerkleError<T::Error>> {
        if self.state == TxnState::Discarded {
            return Err(IndexedMerkleError::InvalidTransaction(
                "transaction already discarded",
            ));
        }
        debug!("discarding transaction");
        self.store_txn
            .discard()
            .map_err(IndexedMerkleError::StorageError)
    }
}

// --- shared read/write primitives, used by both `Tree` and `Txn` ---

fn read_size<T: Transaction>(txn: &T) -> Result<u64, IndexedMerkleError<T::Error>> {
    let raw = txn.get(&size_key()).map_err(IndexedMerkleError::StorageError)?;
    Ok(raw
        .map(|b| FieldElement::from_be_bytes(&b).to_u64_saturating())
        .unwrap_or(0))
}

fn set_size<T: Transaction>(txn: &mut T, size: u64) -> Result<(), IndexedMerkleError<T::Error>> {
    let fe = FieldElement::from_u64(size);
    txn.set(&size_key(), &fe.to_minimal_be_bytes())
        .map_err(IndexedMerkleError::StorageError)
}

fn read_leaf<T: Transaction>(
    txn: &T,
    key: &FieldElement,
    fe_len: usize,
) -> Result<Option<Node>, IndexedMerkleError<T::Error>> {
    let storage_key = leaf_key(key, fe_len)?;
    let raw = txn
        .get(&storage_key)
        .map_err(IndexedMerkleError::StorageError)?;
    match raw {
        Some(bytes) => Ok(Some(Node::decode(key.clone(), &bytes)?)),
        None => Ok(None),
    }
}

/// Finds the occupied leaf with the greatest key strictly less than `key`,
/// falling back to the genesis leaf if none exists.
fn read_low_nullifier<T: Transaction>(
    txn: &T,
    key: &FieldElement,
    fe_len: usize,
) -> Result<Node, IndexedMerkleError<T::Error>> {
    let storage_key = leaf_key(key, fe_len)?;
    let found = txn
        .get_lt(&storage_key)
        .map_err(IndexedMerkleError::StorageError)?;
    match found {
        Some((raw_key, raw_value)) => {
            let low_key = leaf_key_to_field(&raw_key);
            Ok(Node::decode(low_key, &raw_value)?)
        }
        None => Ok(Node::genesis()),
    }
}

/// Computes the current root: `H(topHash, size)`, where `topHash` is the
/// level-0 internal hash, or the genesis leaf hash if no writes have
/// happened yet.
fn read_root<T: Transaction>(
    txn: &T,
    depth: u32,
    hasher: &impl FieldHasher,
) -> Result<FieldElement, IndexedMerkleError<T::Error>> {
    let raw = txn
        .get(&hash_key(0, 0, depth))
        .map_err(IndexedMerkleError::StorageError)?;
    let top_hash = match raw {
        Some(bytes) => FieldElement::from_be_bytes(&bytes),
        None => Node::genesis()
            .hash(hasher)
            .map_err(IndexedMerkleError::HashError)?,
    };
    let size = read_size(txn)?;
    hasher
        .hash(&[top_hash, FieldElement::from_u64(size)])
        .map_err(IndexedMerkleError::HashError)
}

/// For each level `l in [0, depth)`, reads the sibling hash encountered
/// ascending from `l + 1` to `l`.
/// Missing entries decode as `0` (sparse empty).
fn gather_siblings<T: Transaction>(
    txn: &T,
    index: u64,
    depth: u32,
) -> Result<Vec<FieldElement>, IndexedMerkleError<T::Error>> {
    let mut siblings = vec![FieldElement::zero(); depth as usize];
    let mut idx = index;
    for i in 0..depth {
        let level = depth - 1 - i;
        let sibling_index = idx ^ 1;
        let raw = txn
            .get(&hash_key(sibling_index, level + 1, depth))
            .map_err(IndexedMerkleError::StorageError)?;
        siblings[level as usize] = raw
            .map(|b| FieldElement::from_be_bytes(&b))
            .unwrap_or_else(FieldElement::zero);
        idx /= 2;
    }
    Ok(siblings)
}

/// Path rewrite: persists the leaf, then walks from
/// the leaf level up to the root, combining with each sibling using the
/// same bit convention the verifier uses (`index_bit`, LSB-first), and
/// applying the sparse zero-short-circuit. Returns the sibling vector
/// gathered along the way. Fails with `OverCapacity` if the path does not
/// terminate at the root index `0`.
fn set_node<T: Transaction>(
    txn: &mut T,
    node: &Node,
    fe_len: usize,
    depth: u32,
    hasher: &impl FieldHasher,
) -> Result<Vec<FieldElement>, IndexedMerkleError<T::Error>> {
    txn.set(&leaf_key(&node.key, fe_len)?, &node.encode())
        .map_err(IndexedMerkleError::StorageError)?;

    let mut h = node.hash(hasher).map_err(IndexedMerkleError::HashError)?;
    txn.set(&hash_key(node.index, depth, depth), &h.to_minimal_be_bytes())
        .map_err(IndexedMerkleError::StorageError)?;

    let mut siblings = vec![FieldElement::zero(); depth as usize];
    let mut idx = node.index;
    for i in 0..depth {
        let level = depth - 1 - i;
        let sibling_index = idx ^ 1;
        let raw = txn
            .get(&hash_key(sibling_index, level + 1, depth))
            .map_err(IndexedMerkleError::StorageError)?;
        let s = raw
            .map(|b| FieldElement::from_be_bytes(&b))
            .unwrap_or_else(FieldElement::zero);
        siblings[level as usize] = s.clone();

        if !s.is_zero() {
            let bit = index_bit(node.index, i);
            let (left, right) = if !bit { (h.clone(), s) } else { (s, h.clone()) };
            h = hasher.hash(&[left, right]).map_err(IndexedMerkleError::HashError)?;
        }

        idx /= 2;
        txn.set(&hash_key(idx, level, depth), &h.to_minimal_be_bytes())
            .map_err(IndexedMerkleError::StorageError)?;

        if level == 0 && idx != 0 {
            metrics::inc_over_capacity();
            return Err(IndexedMerkleError::OverCapacity {
                depth,
                capacity: 1u64 << depth,
            });
        }
    }

    metrics::inc_leaf_write();

    Ok(siblings)
}
