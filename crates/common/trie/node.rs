mod branch;
mod extension;
mod leaf;

use std::sync::{Arc, OnceLock};

pub use branch::BranchNode;
pub use extension::ExtensionNode;
pub use leaf::LeafNode;

use gmpt_rlp::encode::RLPEncode;

use crate::{
    TrieDB, ValueRLP, error::TrieError, nibbles::Nibbles, node_hash::NodeHash, node_key::NodeKey,
    node_set::NodeSet,
};

/// A reference to a node.
///
/// The empty subtrie is the default reference, an inline hash of length zero.
#[derive(Clone, Debug)]
pub enum NodeRef {
    /// The node is held in memory, with its hash memoized once computed.
    Node(Arc<Node>, OnceLock<NodeHash>),
    /// The node lives in the database (or inline in the hash), resolved on demand.
    Hash(NodeHash),
}

impl NodeRef {
    /// Resolves the referenced node. `path` is the absolute path of the node in the trie,
    /// which is part of its database key.
    /// Returns `None` only for the empty reference.
    pub fn get_node(&self, db: &dyn TrieDB, path: Nibbles) -> Result<Option<Node>, TrieError> {
        match self {
            NodeRef::Node(node, _) => Ok(Some(node.as_ref().clone())),
            NodeRef::Hash(hash) if !hash.is_valid() => Ok(None),
            NodeRef::Hash(hash @ NodeHash::Inline(_)) => Node::decode(hash.as_ref()).map(Some),
            NodeRef::Hash(hash @ NodeHash::Hashed(_)) => {
                let key = NodeKey::new(path, hash.finalize());
                let Some(encoded) = db.get(&key)? else {
                    return Err(TrieError::MissingNode {
                        path: key.path,
                        hash: key.hash,
                    });
                };
                // the root is stored under its full hash even when short enough to be inlined
                if NodeHash::from_encoded(&encoded).finalize() != key.hash {
                    return Err(TrieError::InconsistentTree);
                }
                Node::decode(&encoded).map(Some)
            }
        }
    }

    /// Resolves a reference that must not be empty
    pub fn get_child(&self, db: &dyn TrieDB, path: Nibbles) -> Result<Node, TrieError> {
        self.get_node(db, path)?.ok_or(TrieError::InconsistentTree)
    }

    /// False for the empty reference
    pub fn is_valid(&self) -> bool {
        match self {
            NodeRef::Node(_, _) => true,
            NodeRef::Hash(hash) => hash.is_valid(),
        }
    }

    /// True if the node was created or modified since it was last committed
    pub fn is_dirty(&self) -> bool {
        matches!(self, NodeRef::Node(_, _))
    }

    /// Encodes every dirty node below and including this one in postorder, pushing the
    /// hashed ones into `acc`, and turns the in-memory references into hash references.
    pub fn commit(&mut self, path: Nibbles, acc: &mut NodeSet) -> NodeHash {
        match *self {
            NodeRef::Node(ref mut node, ref hash) => {
                match Arc::make_mut(node) {
                    Node::Branch(branch) => {
                        for (choice, child) in branch.choices.iter_mut().enumerate() {
                            child.commit(path.append_new(choice as u8), acc);
                        }
                    }
                    Node::Extension(extension) => {
                        extension.child.commit(path.concat(&extension.prefix), acc);
                    }
                    Node::Leaf(_) => {}
                }
                let encoded = node.encode_to_vec();
                let hash = *hash.get_or_init(|| NodeHash::from_encoded(&encoded));
                if let NodeHash::Hashed(node_hash) = hash {
                    acc.push(path, node_hash, encoded);
                }

                *self = hash.into();
                hash
            }
            NodeRef::Hash(hash) => hash,
        }
    }

    pub fn compute_hash(&self) -> NodeHash {
        match self {
            NodeRef::Node(node, hash) => *hash.get_or_init(|| node.compute_hash()),
            NodeRef::Hash(hash) => *hash,
        }
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::Hash(NodeHash::default())
    }
}

impl From<Node> for NodeRef {
    fn from(value: Node) -> Self {
        Self::Node(Arc::new(value), OnceLock::new())
    }
}

impl From<NodeHash> for NodeRef {
    fn from(value: NodeHash) -> Self {
        Self::Hash(value)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.compute_hash() == other.compute_hash()
    }
}

/// A Node in an Ethereum Compatible Patricia Merkle Trie
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

impl From<Box<BranchNode>> for Node {
    fn from(val: Box<BranchNode>) -> Self {
        Node::Branch(val)
    }
}

impl From<BranchNode> for Node {
    fn from(val: BranchNode) -> Self {
        Node::Branch(Box::new(val))
    }
}

impl From<ExtensionNode> for Node {
    fn from(val: ExtensionNode) -> Self {
        Node::Extension(val)
    }
}

impl From<LeafNode> for Node {
    fn from(val: LeafNode) -> Self {
        Node::Leaf(val)
    }
}

impl Node {
    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match self {
            Node::Branch(n) => n.get(db, path),
            Node::Extension(n) => n.get(db, path),
            Node::Leaf(n) => n.get(path),
        }
    }

    /// Inserts a value into the subtrie originating from this node and returns the new root of the subtrie
    pub fn insert(
        self,
        db: &dyn TrieDB,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match self {
            Node::Branch(n) => n.insert(db, path, value),
            Node::Extension(n) => n.insert(db, path, value),
            Node::Leaf(n) => n.insert(path, value),
        }
    }

    /// Removes a value from the subtrie originating from this node given its path
    /// Returns the new root of the subtrie (if any) and the removed value if it existed in the subtrie
    pub fn remove(
        self,
        db: &dyn TrieDB,
        path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        match self {
            Node::Branch(n) => n.remove(db, path),
            Node::Extension(n) => n.remove(db, path),
            Node::Leaf(n) => n.remove(path),
        }
    }

    /// Traverses own subtrie until reaching the node containing `path`
    /// Appends all encoded nodes traversed to `node_path` (including self)
    /// Only nodes with encoded len over or equal to 32 bytes are included
    pub fn get_path(
        &self,
        db: &dyn TrieDB,
        path: Nibbles,
        node_path: &mut Vec<Vec<u8>>,
    ) -> Result<(), TrieError> {
        let encoded = self.encode_to_vec();
        if encoded.len() >= crate::node_hash::INLINE_THRESHOLD {
            node_path.push(encoded);
        }
        match self {
            Node::Branch(n) => n.get_path(db, path, node_path),
            Node::Extension(n) => n.get_path(db, path, node_path),
            Node::Leaf(_) => Ok(()),
        }
    }

    /// Computes the node's hash
    pub fn compute_hash(&self) -> NodeHash {
        let mut buf = crate::hasher::encode_buffer();
        self.encode(&mut *buf);
        NodeHash::from_encoded(&buf)
    }
}
