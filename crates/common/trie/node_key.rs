use ethereum_types::H256;

use crate::nibbles::Nibbles;

/// Key a node is stored under: its absolute path in the trie and the hash of its encoding.
///
/// Keying by path lets a store find the node a newer version supersedes, keying by hash
/// keeps every version of the same path apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub path: Nibbles,
    pub hash: H256,
}

impl NodeKey {
    pub fn new(path: Nibbles, hash: H256) -> Self {
        Self { path, hash }
    }

    /// Flat byte form of the key: the packed path, the node hash and the amount of path nibbles.
    /// The nibble count tells apart paths that only differ in a trailing zero nibble.
    pub fn encode_key(&self) -> Vec<u8> {
        let packed = self.path.to_bytes();
        let mut key = Vec::with_capacity(packed.len() + 32 + 4);
        key.extend_from_slice(&packed);
        key.extend_from_slice(self.hash.as_bytes());
        key.extend_from_slice(&(self.path.len() as u32).to_be_bytes());
        key
    }
}
