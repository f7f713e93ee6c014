use std::sync::Mutex;

use crate::{TrieDB, error::TrieError, node_key::NodeKey, node_set::NodeSet};

/// Store wrapper that records the key of every node read through it.
///
/// Mutations run over a recorder so the trie learns which stored node it replaces at each path,
/// see [`NodeSet::annotate_origins`].
pub struct OriginRecorder<'a> {
    inner: &'a dyn TrieDB,
    reads: Mutex<Vec<NodeKey>>,
}

impl<'a> OriginRecorder<'a> {
    pub fn new(inner: &'a dyn TrieDB) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Keys of the nodes read so far, in read order
    pub fn into_reads(self) -> Result<Vec<NodeKey>, TrieError> {
        self.reads.into_inner().map_err(|_| TrieError::LockError)
    }
}

impl TrieDB for OriginRecorder<'_> {
    fn get(&self, key: &NodeKey) -> Result<Option<Vec<u8>>, TrieError> {
        let result = self.inner.get(key)?;
        if result.is_some() {
            let mut lock = self.reads.lock().map_err(|_| TrieError::LockError)?;
            lock.push(key.clone());
        }
        Ok(result)
    }

    fn put_batch(&self, nodes: NodeSet) -> Result<(), TrieError> {
        self.inner.put_batch(nodes)
    }
}

#[cfg(test)]
mod test {
    use ethereum_types::H256;

    use super::*;
    use crate::{InMemoryTrieDB, nibbles::Nibbles};

    #[test]
    fn records_only_hits() {
        let db = InMemoryTrieDB::new_empty();
        let stored = NodeKey::new(Nibbles::from_hex(vec![3]), H256::repeat_byte(3));
        let mut set = NodeSet::new();
        set.push(stored.path.clone(), stored.hash, vec![0xc0]);
        db.put_batch(set).unwrap();

        let recorder = OriginRecorder::new(&db);
        let missing = NodeKey::new(Nibbles::from_hex(vec![4]), H256::repeat_byte(4));
        assert_eq!(recorder.get(&missing).unwrap(), None);
        assert_eq!(recorder.get(&stored).unwrap(), Some(vec![0xc0]));
        assert_eq!(recorder.into_reads().unwrap(), vec![stored]);
    }
}
