//! The KV store adapter.
//!
//! This crate is agnostic to the backing KV engine; it only assumes a
//! byte-lexicographically ordered key space with point reads, a strict
//! predecessor read (`get_lt`), and transactional writes, collapsed into
//! one trait because a single mutation needs read-your-writes within its
//! own transaction (the low-nullifier lookup must see prior writes from
//! the same `Txn`, and the path rewrite's sibling reads must see earlier
//! path writes from the same mutation).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// A read/write transaction over an ordered byte-keyed store.
///
/// Implementations are responsible for providing read-your-writes
/// consistency: a `get`/`get_lt` issued after a `set` within the same
/// transaction must observe that write.
pub trait Transaction {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Point read. Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Strict predecessor read: the key/value pair with the greatest key
    /// that is byte-lexicographically less than `key`, or `None` if no
    /// such key exists.
    fn get_lt(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, Self::Error>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Commits all writes made through this transaction. Consumes the
    /// transaction so it cannot be reused afterward.
    fn commit(self) -> Result<(), Self::Error>;

    /// Discards all writes made through this transaction.
    fn discard(self) -> Result<(), Self::Error>;
}

/// An in-memory reference store, backed by a `BTreeMap` (rather than a
/// `HashMap`) so `get_lt` is a native range query.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a transaction. Writes are buffered locally and only applied
    /// to the shared map on `commit`.
    pub fn begin(&self) -> MemStoreTxn {
        MemStoreTxn {
            store: self.inner.clone(),
            writes: BTreeMap::new(),
        }
    }
}

/// A transaction over [`MemStore`]. Reads fall through to locally-buffered
/// writes first, then to the committed backing map, giving read-your-writes
/// semantics within one transaction.
pub struct MemStoreTxn {
    store: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
pub enum MemStoreError {
    #[error("in-memory store lock was poisoned")]
    Poisoned,
}

impl Transaction for MemStoreTxn {
    type Error = MemStoreError;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        if let Some(v) = self.writes.get(key) {
            return Ok(Some(v.clone()));
        }
        let guard = self.store.read().map_err(|_| MemStoreError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn get_lt(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>, Self::Error> {
        let guard = self.store.read().map_err(|_| MemStoreError::Poisoned)?;
        // Merge the committed view with locally-buffered writes, then take
        // the greatest key strictly less than `key`.
        let committed = guard
            .range(..key.to_vec())
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone()));
        let local = self
            .writes
            .range(..key.to_vec())
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(match (committed, local) {
            (Some(c), Some(l)) => Some(if c.0 >= l.0 { c } else { l }),
            (Some(c), None) => Some(c),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        })
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.writes.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn commit(self) -> Result<(), Self::Error> {
        let mut guard = self.store.write().map_err(|_| MemStoreError::Poisoned)?;
        for (k, v) in self.writes {
            guard.insert(k, v);
        }
        Ok(())
    }

    fn discard(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_your_writes_within_a_transaction() {
        let store = MemStore::new();
        let mut txn = store.begin();
        assert_eq!(txn.get(b"a").unwrap(), None);
        txn.set(b"a", b"1").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn discard_does_not_persist_writes() {
        let store = MemStore::new();
        let mut txn = store.begin();
        txn.set(b"a", b"1").unwrap();
        txn.discard().unwrap();
        let txn2 = store.begin();
        assert_eq!(txn2.get(b"a").unwrap(), None);
    }

    #[test]
    fn commit_persists_writes_for_later_transactions() {
        let store = MemStore::new();
        let mut txn = store.begin();
        txn.set(b"a", b"1").unwrap();
        txn.commit().unwrap();
        let txn2 = store.begin();
        assert_eq!(txn2.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn get_lt_returns_strict_predecessor() {
        let store = MemStore::new();
        let mut txn = store.begin();
        txn.set(b"a", b"1").unwrap();
        txn.set(b"c", b"3").unwrap();
        assert_eq!(txn.get_lt(b"b").unwrap(), Some((b"a".to_vec(), b"1".to_vec())));
        assert_eq!(txn.get_lt(b"a").unwrap(), None);
        assert_eq!(
            txn.get_lt(b"d").unwrap(),
            Some((b"c".to_vec(), b"3".to_vec()))
        );
    }

    #[test]
    fn get_lt_merges_committed_and_local_writes() {
        let store = MemStore::new();
        let mut setup = store.begin();
        setup.set(b"a", b"1").unwrap();
        setup.commit().unwrap();

        let mut txn = store.begin();
        txn.set(b"b", b"2").unwrap();
        assert_eq!(txn.get_lt(b"c").unwrap(), Some((b"b".to_vec(), b"2".to_vec())));
        assert_eq!(txn.get_lt(b"b").unwrap(), Some((b"a".to_vec(), b"1".to_vec())));
    }
}
