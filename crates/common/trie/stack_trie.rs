//! Root hash computation for keys inserted in strictly increasing order.
//!
//! Only the rightmost path of the trie is held in memory. Subtries to the left of the last
//! key can never change again, so they are sealed into their hash as soon as a key diverges
//! from them.

use ethereum_types::H256;

use crate::{
    EMPTY_TRIE_HASH, PathRLP, ValueRLP,
    error::TrieError,
    nibbles::{Nibbles, TERMINATOR},
    node::{BranchNode, ExtensionNode, LeafNode, Node, NodeRef},
    node_hash::NodeHash,
};

/// A branch on the path of the last key that may still receive children
#[derive(Debug, Clone)]
struct Frame {
    depth: usize,
    branch: BranchNode,
}

/// The subtrie holding the last key, not yet attached to its parent branch
#[derive(Debug, Clone)]
enum Pending {
    Leaf(ValueRLP),
    /// Sealed branch found at `depth` nibbles along the last key
    Branch { depth: usize, hash: NodeHash },
}

/// Computes the same root hash as [`crate::Trie`] for a sorted sequence of unique keys,
/// without a backing store.
#[derive(Debug, Default)]
pub struct StackTrie {
    /// Open branches, the deepest one last
    stack: Vec<Frame>,
    pending: Option<Pending>,
    last_key: PathRLP,
    last_path: Nibbles,
}

impl StackTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key that must be greater than every key added before
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        if value.is_empty() {
            return Err(TrieError::InvalidInput("empty values can't be stored"));
        }
        let Some(pending) = self.pending.take() else {
            self.pending = Some(Pending::Leaf(value.to_vec()));
            self.last_key = key.to_vec();
            self.last_path = Nibbles::from_bytes(key);
            return Ok(());
        };
        if key <= self.last_key.as_slice() {
            // keep the trie as it was
            self.pending = Some(pending);
            return Err(TrieError::InvalidInput(
                "keys must be inserted in strictly increasing order",
            ));
        }

        let path = Nibbles::from_bytes(key);
        // The new key branches off the last one right after their common prefix
        let fork = self.last_path.count_prefix(&path);
        let mut pending = pending;
        while let Some(frame) = self.stack.pop() {
            if frame.depth <= fork {
                self.stack.push(frame);
                break;
            }
            pending = self.seal_frame(frame, pending)?;
        }
        let mut frame = match self.stack.pop() {
            Some(frame) if frame.depth == fork => frame,
            shallower => {
                self.stack.extend(shallower);
                Frame {
                    depth: fork,
                    branch: BranchNode::default(),
                }
            }
        };
        self.attach(&mut frame, pending)?;
        self.stack.push(frame);

        self.pending = Some(Pending::Leaf(value.to_vec()));
        self.last_key = key.to_vec();
        self.last_path = path;
        Ok(())
    }

    /// Root hash of the keys added so far, `EMPTY_TRIE_HASH` if none
    pub fn hash(&self) -> Result<H256, TrieError> {
        let Some(pending) = &self.pending else {
            return Ok(*EMPTY_TRIE_HASH);
        };
        let mut pending = pending.clone();
        for frame in self.stack.iter().rev() {
            pending = self.seal_frame(frame.clone(), pending)?;
        }
        Ok(self.seal(pending, 0).finalize())
    }

    /// Drops every key added so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Attaches the pending subtrie to its frame and seals the frame
    fn seal_frame(&self, mut frame: Frame, pending: Pending) -> Result<Pending, TrieError> {
        self.attach(&mut frame, pending)?;
        Ok(Pending::Branch {
            depth: frame.depth,
            hash: Node::from(frame.branch).compute_hash(),
        })
    }

    /// Places the pending subtrie below `frame`, following the last key
    fn attach(&self, frame: &mut Frame, pending: Pending) -> Result<(), TrieError> {
        let choice = self.last_path.at(frame.depth);
        if choice == TERMINATOR as usize {
            // the last key ends at this branch
            let Pending::Leaf(value) = pending else {
                return Err(TrieError::InconsistentTree);
            };
            frame.branch.value = value;
        } else {
            frame.branch.choices[choice] = self.seal(pending, frame.depth + 1).into();
        }
        Ok(())
    }

    /// Hash of the pending subtrie when its parent consumed `start` nibbles of the last key
    fn seal(&self, pending: Pending, start: usize) -> NodeHash {
        match pending {
            Pending::Leaf(value) => {
                let partial = self.last_path.slice(start, self.last_path.len());
                Node::from(LeafNode::new(partial, value)).compute_hash()
            }
            Pending::Branch { depth, hash } if depth == start => hash,
            Pending::Branch { depth, hash } => {
                let prefix = self.last_path.slice(start, depth);
                Node::from(ExtensionNode::new(prefix, NodeRef::from(hash))).compute_hash()
            }
        }
    }
}
