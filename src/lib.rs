// Copyright (c) Aptos
// SPDX-License-Identifier: Apache-2.0
// Adapted from aptos-labs/jellyfish-merkle
// Modified to be generic over choice of hash function

#![forbid(unsafe_code)]

//! This crate implements an **indexed Merkle tree** (IMT): a persistent,
//! sparse, append-friendly authenticated key-value store over a prime-field
//! domain, producing inclusion and exclusion proofs suitable for
//! consumption by a zero-knowledge proving circuit.
//!
//! The tree embeds a sorted singly-linked list of occupied leaves inside a
//! fixed-depth sparse Merkle tree. Every occupied leaf carries, alongside
//! its `key`/`value`, the key of the next-larger occupied leaf (`nextKey`).
//! An exclusion proof is then just the inclusion proof of a leaf's
//! low-nullifier — the leaf whose `key` is the strict predecessor of the
//! queried key — together with the ordering check `lowKey < key <=
//! nextKey`. This gives non-membership proofs with no separate gadget for
//! absence, which is the entire point of the "indexed" construction.
//!
//! ```text
//!                                    root = H(topHash, size)
//!                                         │
//!                                    sparse Merkle tree, depth L
//!                                         │
//!            ┌────────────────────────────────────────────────────┐
//!            │                                                      │
//!        index 0                                              index size
//!    (genesis leaf)                                         (latest insert)
//!   key=0 ──nextKey──▶ key=3 ──nextKey──▶ key=5 ──nextKey──▶ ... ──▶ 0
//! ```
//!
//! This crate owns two things, both specified bit-for-bit so a verifying
//! circuit can replicate them exactly:
//!
//! 1. The on-disk engine ([`tree`]): leaf layout ([`node`]), storage key
//!    encoding ([`keys`]), and the insert/update algorithms that maintain
//!    both the linked list and every sibling hash along the affected
//!    path(s).
//! 2. The proof verifier ([`proof`]): pure functions that re-derive a root
//!    from a leaf, its sibling vector, and (for mutations) an old/new
//!    witness, enforcing every invariant along the way.
//!
//! Three things are deliberately injected rather than owned by this crate,
//! all per this system's stated scope:
//!
//! - The backing key-value store ([`store::Transaction`]): this crate only
//!   assumes byte-lexicographic ordering, point reads, a strict-predecessor
//!   read, and transactional writes. A reference in-memory implementation,
//!   [`store::MemStore`], is provided for tests and for callers without a
//!   real engine wired up yet.
//! - The field-element hash oracle ([`hasher::FieldHasher`]): any
//!   algebraic hash suitable for the target proof system. This crate never
//!   performs field arithmetic itself — only comparison, ordering, and
//!   byte (de)serialization of [`field::FieldElement`] values.
//! - The arithmetic-circuit embedding: out of scope entirely. This crate's
//!   job is to make sure a valid witness it produces is also a valid
//!   witness for whatever circuit implements the same check ordering as
//!   [`proof::verify`]/[`proof::verify_mutation`].

pub mod errors;
pub mod field;
pub mod hasher;
pub mod keys;
pub mod metrics;
pub mod node;
pub mod proof;
pub mod store;
pub mod tree;

pub use errors::{CodecError, IndexedMerkleError, ProofError};
pub use field::FieldElement;
pub use hasher::FieldHasher;
pub use node::Node;
pub use proof::{verify, verify_mutation, MutationWitness, Proof};
pub use store::{MemStore, Transaction};
pub use tree::{open, Tree, Txn};
