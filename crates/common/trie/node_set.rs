use std::collections::BTreeMap;

use ethereum_types::H256;

use crate::{EMPTY_TRIE_HASH, nibbles::Nibbles, node_key::NodeKey};

/// A node written by a commit
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSetEntry {
    /// Absolute path of the node in the trie
    pub path: Nibbles,
    pub hash: H256,
    /// Canonical encoding of the node
    pub encoded: Vec<u8>,
    /// Hash of the node this one replaces at the same path, if the previous version held one
    pub prev_hash: Option<H256>,
}

impl NodeSetEntry {
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.path.clone(), self.hash)
    }

    /// Key of the superseded node, if any
    pub fn prev_key(&self) -> Option<NodeKey> {
        self.prev_hash
            .map(|prev_hash| NodeKey::new(self.path.clone(), prev_hash))
    }
}

/// Nodes produced by a single commit, children before parents.
/// The root node, when hashed, is the last entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSet {
    entries: Vec<NodeSetEntry>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: Nibbles, hash: H256, encoded: Vec<u8>) {
        self.entries.push(NodeSetEntry {
            path,
            hash,
            encoded,
            prev_hash: None,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSetEntry> {
        self.entries.iter()
    }

    /// Total amount of encoded bytes held by the set
    pub fn size(&self) -> usize {
        self.entries.iter().map(|entry| entry.encoded.len()).sum()
    }

    /// The last committed node, which is the root of the committed version
    pub fn root(&self) -> Option<&NodeSetEntry> {
        self.entries.last()
    }

    /// Records which node each entry replaces.
    /// `origins` maps the paths of the nodes loaded from the store during mutation to their hashes,
    /// the root path falls back to the previously committed root.
    pub fn annotate_origins(&mut self, origins: &BTreeMap<Nibbles, H256>, committed_root: H256) {
        for entry in self.entries.iter_mut() {
            let prev = origins.get(&entry.path).copied().or_else(|| {
                (entry.path.is_empty() && committed_root != *EMPTY_TRIE_HASH)
                    .then_some(committed_root)
            });
            entry.prev_hash = prev.filter(|prev| *prev != entry.hash);
        }
    }
}

impl IntoIterator for NodeSet {
    type Item = NodeSetEntry;
    type IntoIter = std::vec::IntoIter<NodeSetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
