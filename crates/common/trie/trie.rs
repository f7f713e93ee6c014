//! Ethereum compatible Merkle Patricia Trie.
//!
//! Nodes are held in memory as copy-on-write trees until committed, at which point they are
//! encoded, hashed and handed to a [`TrieDB`] as a [`NodeSet`].

pub mod accelerator;
pub mod config;
pub mod db;
pub mod derive_sha;
pub mod error;
mod hasher;
mod nibbles;
pub mod node;
mod node_hash;
mod node_key;
pub mod node_set;
mod parallel;
pub mod pool;
mod proof;
mod recorder;
mod rlp;
pub mod stack_trie;
mod threadpool;
mod trie_iter;

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use ethereum_types::H256;
use gmpt_rlp::constants::RLP_NULL;
use lazy_static::lazy_static;
use tracing::debug;

pub use self::db::{InMemoryTrieDB, NullTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::hasher::{keccak, prefixed_rlp_hash, rlp_hash};
pub use self::nibbles::{Nibbles, TERMINATOR};
pub use self::node::Node;
pub use self::node_hash::{INLINE_THRESHOLD, NodeHash};
pub use self::node_key::NodeKey;
pub use self::node_set::{NodeSet, NodeSetEntry};
pub use self::proof::verify_proof;
pub use self::trie_iter::TrieIterator;

use self::{
    node::{LeafNode, NodeRef},
    recorder::OriginRecorder,
};

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = keccak(&[RLP_NULL]);
}

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;
/// RLP-encoded trie node
pub type NodeRLP = Vec<u8>;

/// Ethereum Compatible Merkle Patricia Trie
///
/// Cloning a trie is cheap and yields an independent snapshot: both copies share their
/// unchanged nodes and mutations on one are never seen by the other.
#[derive(Clone)]
pub struct Trie {
    db: Arc<dyn TrieDB>,
    root: NodeRef,
    /// Root hash of the last committed version
    committed_root: H256,
    /// Hashes of the stored nodes replaced since the last commit, by path
    origins: BTreeMap<Nibbles, H256>,
}

impl Trie {
    /// Creates a new Trie from a clean DB
    pub fn new(db: Box<dyn TrieDB>) -> Self {
        Self {
            db: Arc::from(db),
            root: NodeRef::default(),
            committed_root: *EMPTY_TRIE_HASH,
            origins: BTreeMap::new(),
        }
    }

    /// Creates a trie from an already-initialized DB and sets root as the root node of the trie.
    /// Nodes are loaded from the DB as they are needed.
    pub fn open(db: Box<dyn TrieDB>, root: H256) -> Self {
        let root_ref = if root == *EMPTY_TRIE_HASH {
            NodeRef::default()
        } else {
            NodeHash::Hashed(root).into()
        };
        Self {
            db: Arc::from(db),
            root: root_ref,
            committed_root: root,
            origins: BTreeMap::new(),
        }
    }

    /// Creates a new stateless trie. This trie won't be able to store any nodes so all data will be lost
    /// once committed. Only use it for computing hashes with [`Trie::hash_no_commit`] or for proofs.
    pub fn stateless() -> Self {
        Self::new(Box::new(NullTrieDB))
    }

    /// Returns the backing store of the trie
    pub fn db(&self) -> &dyn TrieDB {
        self.db.as_ref()
    }

    /// Retrieve an RLP-encoded value from the trie given its RLP-encoded path.
    pub fn get(&self, path: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        self.get_path(Nibbles::from_bytes(path))
    }

    /// Same as [`Trie::get`] but for a key already split into nibbles, terminator included
    pub fn get_hex(&self, hex: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        self.get_path(hex_path(hex)?)
    }

    fn get_path(&self, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match self.root.get_node(self.db(), Nibbles::default())? {
            Some(root) => root.get(self.db(), path),
            None => Ok(None),
        }
    }

    /// Insert an RLP-encoded value into the trie.
    /// Inserting an empty value removes the path.
    pub fn insert(&mut self, path: PathRLP, value: ValueRLP) -> Result<(), TrieError> {
        self.insert_path(Nibbles::from_bytes(&path), value)
    }

    /// Same as [`Trie::insert`] but for a key already split into nibbles, terminator included
    pub fn insert_hex(&mut self, hex: &[u8], value: ValueRLP) -> Result<(), TrieError> {
        self.insert_path(hex_path(hex)?, value)
    }

    fn insert_path(&mut self, path: Nibbles, value: ValueRLP) -> Result<(), TrieError> {
        if value.is_empty() {
            return self.remove_path(path).map(|_| ());
        }
        let recorder = OriginRecorder::new(self.db.as_ref());
        let new_root = match self.root.get_node(&recorder, Nibbles::default())? {
            // If the trie is not empty, call the root node's insertion logic
            Some(root) => root.insert(&recorder, path, value)?,
            // If the trie is empty, just add a leaf.
            None => LeafNode::new(path, value).into(),
        };
        let reads = recorder.into_reads()?;
        self.record_origins(reads);
        self.root = new_root.into();
        Ok(())
    }

    /// Remove a value from the trie given its RLP-encoded path.
    /// Returns the value if it was succesfully removed or None if it wasn't part of the trie
    pub fn remove(&mut self, path: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        self.remove_path(Nibbles::from_bytes(path))
    }

    /// Same as [`Trie::remove`] but for a key already split into nibbles, terminator included
    pub fn remove_hex(&mut self, hex: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        self.remove_path(hex_path(hex)?)
    }

    fn remove_path(&mut self, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        let recorder = OriginRecorder::new(self.db.as_ref());
        let Some(root) = self.root.get_node(&recorder, Nibbles::default())? else {
            return Ok(None);
        };
        let (new_root, old_value) = root.remove(&recorder, path)?;
        // Keep the current root untouched if nothing was removed
        if old_value.is_some() {
            let reads = recorder.into_reads()?;
            self.record_origins(reads);
            self.root = new_root.map(NodeRef::from).unwrap_or_default();
        }
        Ok(old_value)
    }

    fn record_origins(&mut self, reads: Vec<NodeKey>) {
        for key in reads {
            self.origins.entry(key.path).or_insert(key.hash);
        }
    }

    /// Return the hash of the trie's root node.
    /// Returns keccak(RLP_NULL) if the trie is empty
    /// Also commits changes to the DB
    pub fn hash(&mut self) -> Result<H256, TrieError> {
        let (root_hash, nodes) = self.commit()?;
        if !nodes.is_empty() {
            self.db.put_batch(nodes)?;
        }
        Ok(root_hash)
    }

    /// Return the hash of the trie's root node.
    /// Returns keccak(RLP_NULL) if the trie is empty
    pub fn hash_no_commit(&self) -> H256 {
        if self.root.is_valid() {
            self.root.compute_hash().finalize()
        } else {
            *EMPTY_TRIE_HASH
        }
    }

    /// Encodes and hashes every node changed since the last commit.
    /// Returns the new root hash and the nodes to persist, children before parents, the root last.
    ///
    /// The trie only keeps hash references to the committed nodes, so the returned set must be
    /// written to the trie's store before the trie can read them again. See [`Trie::hash`].
    pub fn commit(&mut self) -> Result<(H256, NodeSet), TrieError> {
        let mut nodes = NodeSet::new();
        if !self.root.is_dirty() {
            return Ok((self.hash_no_commit(), nodes));
        }
        let start = Instant::now();

        let root_hash = self.root.commit(Nibbles::default(), &mut nodes);
        // The root is always stored under its hash, even when it is small enough to be inlined
        if let NodeHash::Inline(_) = root_hash {
            nodes.push(
                Nibbles::default(),
                root_hash.finalize(),
                root_hash.as_ref().to_vec(),
            );
        }
        nodes.annotate_origins(&self.origins, self.committed_root);
        self.origins.clear();
        self.committed_root = root_hash.finalize();

        debug!(
            root = %format!("{:#x}", self.committed_root),
            nodes = nodes.len(),
            bytes = nodes.size(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Committed trie"
        );
        Ok((self.committed_root, nodes))
    }

    /// Obtain a merkle proof for the given path.
    /// The proof will contain all the encoded nodes traversed until reaching the node where the path is stored (including this last node).
    /// Only the root and nodes with an encoding of at least 32 bytes are included, the rest are embedded in their parents.
    /// The proof will still be constructed even if the path is not stored in the trie, proving its absence.
    pub fn get_proof(&self, path: &[u8]) -> Result<Vec<NodeRLP>, TrieError> {
        // Will store all the encoded nodes traversed until reaching the node containing the path
        let mut node_path = Vec::new();
        if !self.root.is_valid() {
            return Ok(node_path);
        }
        // If the root is inlined, add it to the node_path
        let root_hash = self.root.compute_hash();
        if root_hash.is_inline() {
            node_path.push(root_hash.as_ref().to_vec());
        }
        if let Some(root) = self.root.get_node(self.db(), Nibbles::default())? {
            root.get_path(self.db(), Nibbles::from_bytes(path), &mut node_path)?;
        }
        Ok(node_path)
    }

    #[cfg(test)]
    /// Creates a new Trie based on a temporary InMemory DB
    pub(crate) fn new_temp() -> Self {
        Trie::new(Box::new(InMemoryTrieDB::new_empty()))
    }
}

impl IntoIterator for Trie {
    type Item = (Nibbles, Node);

    type IntoIter = TrieIterator;

    fn into_iter(self) -> Self::IntoIter {
        TrieIterator::new(self)
    }
}

/// Validates a nibble expanded key: nibbles below 16 ending with the terminator
fn hex_path(hex: &[u8]) -> Result<Nibbles, TrieError> {
    match hex.split_last() {
        Some((&TERMINATOR, nibbles)) if nibbles.iter().all(|nibble| *nibble < TERMINATOR) => {
            Ok(Nibbles::from_slice(hex))
        }
        _ => Err(TrieError::InvalidInput(
            "hex keys must be nibbles ending with the terminator",
        )),
    }
}
