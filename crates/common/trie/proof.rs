use std::collections::BTreeMap;

use ethereum_types::H256;

use crate::{
    NodeRLP, Trie, TrieDB, ValueRLP, error::TrieError, hasher::keccak, node_key::NodeKey,
    node_set::NodeSet,
};

/// Read-only store made of the nodes of a merkle proof, indexed by hash alone
struct ProofDB {
    nodes: BTreeMap<H256, Vec<u8>>,
}

impl ProofDB {
    fn new(proof: &[NodeRLP]) -> Self {
        let nodes = proof
            .iter()
            .map(|node| (keccak(node), node.clone()))
            .collect();
        Self { nodes }
    }
}

impl TrieDB for ProofDB {
    fn get(&self, key: &NodeKey) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.nodes.get(&key.hash).cloned())
    }

    fn put_batch(&self, _nodes: NodeSet) -> Result<(), TrieError> {
        Ok(())
    }
}

/// Checks a proof produced by [`Trie::get_proof`] against the given root.
/// Returns the value stored under `path`, or `None` if the proof shows its absence.
/// Fails with [`TrieError::MissingNode`] if the proof lacks a node needed to reach the path,
/// which includes proofs that don't belong to `root`.
pub fn verify_proof(
    root: H256,
    path: &[u8],
    proof: &[NodeRLP],
) -> Result<Option<ValueRLP>, TrieError> {
    Trie::open(Box::new(ProofDB::new(proof)), root).get(path)
}
