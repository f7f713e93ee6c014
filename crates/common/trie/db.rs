use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use tracing::debug;

use crate::{error::TrieError, node_key::NodeKey, node_set::NodeSet};

/// Backing store of trie nodes.
///
/// Implementations must apply a [`NodeSet`] atomically.
pub trait TrieDB: Send + Sync {
    fn get(&self, key: &NodeKey) -> Result<Option<Vec<u8>>, TrieError>;
    fn put_batch(&self, nodes: NodeSet) -> Result<(), TrieError>;
}

/// InMemory implementation for the TrieDB trait, with get and put operations.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrieDB {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    prune: bool,
}

impl InMemoryTrieDB {
    pub const fn new(map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>) -> Self {
        Self {
            inner: map,
            prune: false,
        }
    }

    pub fn new_empty() -> Self {
        Self::default()
    }

    /// In pruning mode every committed node deletes the node it supersedes at the same path,
    /// so only the latest version stays readable. Otherwise every version is kept.
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Amount of stored nodes
    pub fn len(&self) -> Result<usize, TrieError> {
        Ok(self.inner.read().map_err(|_| TrieError::LockError)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TrieError> {
        Ok(self.len()? == 0)
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, key: &NodeKey) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self
            .inner
            .read()
            .map_err(|_| TrieError::LockError)?
            .get(&key.encode_key())
            .cloned())
    }

    fn put_batch(&self, nodes: NodeSet) -> Result<(), TrieError> {
        let mut db = self.inner.write().map_err(|_| TrieError::LockError)?;
        let (mut written, mut pruned) = (0, 0);
        for entry in nodes {
            if self.prune
                && let Some(prev_key) = entry.prev_key()
                && db.remove(&prev_key.encode_key()).is_some()
            {
                pruned += 1;
            }
            db.insert(entry.key().encode_key(), entry.encoded);
            written += 1;
        }
        debug!(written, pruned, stored = db.len(), "Wrote trie nodes");
        Ok(())
    }
}

/// Store that holds nothing and drops every write.
/// Tries over it can still compute hashes and answer lookups on uncommitted nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTrieDB;

impl TrieDB for NullTrieDB {
    fn get(&self, _key: &NodeKey) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(None)
    }

    fn put_batch(&self, _nodes: NodeSet) -> Result<(), TrieError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use ethereum_types::H256;

    use super::*;
    use crate::nibbles::Nibbles;

    fn set(path: Vec<u8>, hash: u8, prev: Option<u8>) -> NodeSet {
        let mut set = NodeSet::new();
        set.push(Nibbles::from_hex(path.clone()), H256::repeat_byte(hash), vec![hash]);
        if let Some(prev) = prev {
            set.annotate_origins(
                &BTreeMap::from([(Nibbles::from_hex(path), H256::repeat_byte(prev))]),
                H256::zero(),
            );
        }
        set
    }

    #[test]
    fn archive_mode_keeps_every_version() {
        let db = InMemoryTrieDB::new_empty();
        db.put_batch(set(vec![1], 1, None)).unwrap();
        db.put_batch(set(vec![1], 2, Some(1))).unwrap();
        assert_eq!(db.len().unwrap(), 2);
        let old = NodeKey::new(Nibbles::from_hex(vec![1]), H256::repeat_byte(1));
        assert_eq!(db.get(&old).unwrap(), Some(vec![1]));
    }

    #[test]
    fn pruning_mode_drops_superseded_nodes() {
        let db = InMemoryTrieDB::new_empty().with_pruning(true);
        db.put_batch(set(vec![1], 1, None)).unwrap();
        db.put_batch(set(vec![1], 2, Some(1))).unwrap();
        assert_eq!(db.len().unwrap(), 1);
        let old = NodeKey::new(Nibbles::from_hex(vec![1]), H256::repeat_byte(1));
        let new = NodeKey::new(Nibbles::from_hex(vec![1]), H256::repeat_byte(2));
        assert_eq!(db.get(&old).unwrap(), None);
        assert_eq!(db.get(&new).unwrap(), Some(vec![2]));
    }

    #[test]
    fn clones_share_storage() {
        let db = InMemoryTrieDB::new_empty();
        let other = db.clone();
        db.put_batch(set(vec![], 7, None)).unwrap();
        assert!(!other.is_empty().unwrap());
    }

    #[test]
    fn null_db_stores_nothing() {
        let db = NullTrieDB;
        db.put_batch(set(vec![], 7, None)).unwrap();
        let key = NodeKey::new(Nibbles::default(), H256::repeat_byte(7));
        assert_eq!(db.get(&key).unwrap(), None);
    }
}
