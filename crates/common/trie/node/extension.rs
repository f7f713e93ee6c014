use crate::{TrieDB, ValueRLP, error::TrieError, nibbles::Nibbles};

use super::{BranchNode, LeafNode, Node, NodeRef};

/// Extension Node of an Ethereum Compatible Patricia Merkle Trie
/// Contains the node's prefix and its child node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeRef,
}

impl ExtensionNode {
    /// Creates a new extension node given its child and prefix
    pub fn new(prefix: Nibbles, child: NodeRef) -> Self {
        Self { prefix, child }
    }

    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        // If the path is prefixed by this node's prefix, delegate to its child.
        // Otherwise, no value is present.
        if path.skip_prefix(&self.prefix) {
            self.child.get_child(db, path.current())?.get(db, path)
        } else {
            Ok(None)
        }
    }

    /// Inserts a value into the subtrie originating from this node and returns the new root of the subtrie
    pub fn insert(
        mut self,
        db: &dyn TrieDB,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        /* Possible flow paths:
            * Prefix fully matches path
            Extension { prefix, child } -> Extension { prefix , child' } (insert into child)
            * No match between path and prefix
            Extension { prefix, child } -> Branch { [ ] childValue } (insert into new branch node)
            Extension { prefix, child }  -> Branch { [ child ] None } (insert into new branch node)
            Extension { prefix, child }  -> Branch { [ Extension { prefix[1..], child } ] None } (insert into new branch node)
            * Prefix partially matches path
            Extension { prefix, child } -> Extension { prefix[..match], Extension { prefix[match..], child } } (insert into new extension node)
        */
        let match_index = path.count_prefix(&self.prefix);
        if match_index == self.prefix.len() {
            // Insert into child node
            let path = path.offset(match_index);
            let child = self.child.get_child(db, path.current())?;
            self.child = child.insert(db, path, value)?.into();
            Ok(self.into())
        } else if match_index == 0 {
            let choice = self.prefix.at(0);
            let new_node: NodeRef = if self.prefix.len() == 1 {
                self.child
            } else {
                self.prefix = self.prefix.slice(1, self.prefix.len());
                Node::from(self).into()
            };
            let mut branch = BranchNode::default();
            branch.choices[choice] = new_node;
            Box::new(branch).insert(db, path, value)
        } else {
            let inner = ExtensionNode::new(
                self.prefix.slice(match_index, self.prefix.len()),
                self.child,
            );
            let new_child = inner.insert(db, path.offset(match_index), value)?;
            Ok(ExtensionNode::new(self.prefix.slice(0, match_index), new_child.into()).into())
        }
    }

    /// Removes a value from the subtrie originating from this node given its path
    /// Returns the new root of the subtrie (if any) and the removed value if it existed in the subtrie
    pub fn remove(
        mut self,
        db: &dyn TrieDB,
        mut path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        /* Possible flow paths:
            Extension { prefix, child } -> Extension { prefix, child } (no removal)
            Extension { prefix, child } -> None (if child.remove = None)
            Extension { prefix, child } -> Extension { prefix, ChildBranch } (if child.remove = Branch)
            Extension { prefix, child } -> ChildExtension { SelfPrefix+ChildPrefix, ChildExtensionChild } (if child.remove = Extension)
            Extension { prefix, child } -> ChildLeaf { SelfPrefix+ChildPartial, ChildValue } (if child.remove = Leaf)
        */

        // Check if the value is part of the child subtrie according to the prefix
        if !path.skip_prefix(&self.prefix) {
            return Ok((Some(self.into()), None));
        }
        let child = self.child.get_child(db, path.current())?;
        let (child, old_value) = child.remove(db, path)?;
        if old_value.is_none() {
            return Ok((Some(self.into()), None));
        }
        let node = match child {
            None => None,
            Some(Node::Branch(branch)) => {
                self.child = Node::Branch(branch).into();
                Some(self.into())
            }
            Some(Node::Extension(extension)) => Some(
                ExtensionNode::new(self.prefix.concat(&extension.prefix), extension.child).into(),
            ),
            Some(Node::Leaf(leaf)) => {
                Some(LeafNode::new(self.prefix.concat(&leaf.partial), leaf.value).into())
            }
        };
        Ok((node, old_value))
    }

    /// Traverses own subtrie until reaching the node containing `path`
    /// Appends all encoded nodes traversed to `node_path` (excluding self)
    /// Only nodes with encoded len over or equal to 32 bytes are included
    pub fn get_path(
        &self,
        db: &dyn TrieDB,
        mut path: Nibbles,
        node_path: &mut Vec<Vec<u8>>,
    ) -> Result<(), TrieError> {
        if path.skip_prefix(&self.prefix) {
            self.child
                .get_child(db, path.current())?
                .get_path(db, path, node_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Trie;

    fn leaf_ref(partial: Vec<u8>, value: &[u8]) -> NodeRef {
        Node::from(LeafNode::new(Nibbles::from_hex(partial), value.to_vec())).into()
    }

    /// Extension `[0]` over a branch holding the keys 0x00 and 0x01
    fn extension_over_branch() -> ExtensionNode {
        let mut branch = BranchNode::default();
        branch.choices[0] = leaf_ref(vec![16], &[0x12, 0x34, 0x56, 0x78]);
        branch.choices[1] = leaf_ref(vec![16], &[0x34, 0x56, 0x78, 0x9a]);
        ExtensionNode::new(Nibbles::from_hex(vec![0]), Node::from(branch).into())
    }

    #[test]
    fn new() {
        let node = ExtensionNode::new(Nibbles::default(), Default::default());
        assert!(node.prefix.is_empty());
        assert!(!node.child.is_valid());
    }

    #[test]
    fn get_some() {
        let trie = Trie::new_temp();
        let node = extension_over_branch();
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x00])).unwrap(),
            Some(vec![0x12, 0x34, 0x56, 0x78])
        );
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x01])).unwrap(),
            Some(vec![0x34, 0x56, 0x78, 0x9a])
        );
    }

    #[test]
    fn get_none() {
        let trie = Trie::new_temp();
        let node = extension_over_branch();
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x02])).unwrap(),
            None
        );
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x10])).unwrap(),
            None
        );
    }

    #[test]
    fn insert_passthrough() {
        let trie = Trie::new_temp();
        let node = extension_over_branch();
        let path = Nibbles::from_bytes(&[0x02]);
        let node = node.insert(trie.db(), path.clone(), vec![0x02]).unwrap();
        let Node::Extension(ref extension) = node else {
            panic!("expected an extension node");
        };
        assert_eq!(extension.prefix.as_ref(), &[0]);
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x02]));
    }

    #[test]
    fn insert_branch() {
        let trie = Trie::new_temp();
        let node = extension_over_branch();
        let path = Nibbles::from_bytes(&[0x10]);
        let node = node.insert(trie.db(), path.clone(), vec![0x10]).unwrap();
        let Node::Branch(ref branch) = node else {
            panic!("expected a branch node");
        };
        // a single nibble prefix leaves the old child directly in the branch
        assert!(branch.choices[0].is_valid());
        assert!(branch.choices[1].is_valid());
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x10]));
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x01])).unwrap(),
            Some(vec![0x34, 0x56, 0x78, 0x9a])
        );
    }

    #[test]
    fn insert_branch_extension() {
        let trie = Trie::new_temp();
        let mut branch = BranchNode::default();
        branch.choices[0] = leaf_ref(vec![16], &[0x00]);
        branch.choices[1] = leaf_ref(vec![16], &[0x01]);
        let node = ExtensionNode::new(Nibbles::from_hex(vec![0, 0]), Node::from(branch).into());
        let path = Nibbles::from_hex(vec![1, 0, 0, 16]);
        let node = node.insert(trie.db(), path.clone(), vec![0x02]).unwrap();
        let Node::Branch(ref branch) = node else {
            panic!("expected a branch node");
        };
        let NodeRef::Node(ref child, _) = branch.choices[0] else {
            panic!("expected an in-memory child");
        };
        let Node::Extension(ref shortened) = **child else {
            panic!("expected an extension node");
        };
        assert_eq!(shortened.prefix.as_ref(), &[0]);
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x02]));
        assert_eq!(
            node.get(trie.db(), Nibbles::from_hex(vec![0, 0, 1, 16]))
                .unwrap(),
            Some(vec![0x01])
        );
    }

    #[test]
    fn insert_partial_match() {
        let trie = Trie::new_temp();
        let mut branch = BranchNode::default();
        branch.choices[0] = leaf_ref(vec![16], &[0x00]);
        branch.choices[1] = leaf_ref(vec![16], &[0x01]);
        let node = ExtensionNode::new(
            Nibbles::from_hex(vec![0, 1, 2]),
            Node::from(branch).into(),
        );
        let path = Nibbles::from_hex(vec![0, 1, 3, 16]);
        let node = node.insert(trie.db(), path.clone(), vec![0x03]).unwrap();
        let Node::Extension(ref extension) = node else {
            panic!("expected an extension node");
        };
        assert_eq!(extension.prefix.as_ref(), &[0, 1]);
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x03]));
        assert_eq!(
            node.get(trie.db(), Nibbles::from_hex(vec![0, 1, 2, 0, 16]))
                .unwrap(),
            Some(vec![0x00])
        );
    }

    #[test]
    fn remove_none() {
        let trie = Trie::new_temp();
        let node = extension_over_branch();
        let (node, value) = node.remove(trie.db(), Nibbles::from_bytes(&[0x02])).unwrap();
        assert!(matches!(node, Some(Node::Extension(_))));
        assert_eq!(value, None);
    }

    #[test]
    fn remove_into_leaf() {
        let trie = Trie::new_temp();
        let node = extension_over_branch();
        let (node, value) = node.remove(trie.db(), Nibbles::from_bytes(&[0x01])).unwrap();
        // the branch collapses and the remaining leaf absorbs both prefixes
        let Some(Node::Leaf(leaf)) = node else {
            panic!("expected a leaf node");
        };
        assert_eq!(leaf.partial.as_ref(), &[0, 0, 16]);
        assert_eq!(leaf.value, vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(value, Some(vec![0x34, 0x56, 0x78, 0x9a]));
    }

    #[test]
    fn remove_keeps_extension_over_branch() {
        let trie = Trie::new_temp();
        let mut branch = BranchNode::default();
        branch.choices[0] = leaf_ref(vec![16], &[0x00]);
        branch.choices[1] = leaf_ref(vec![16], &[0x01]);
        branch.choices[2] = leaf_ref(vec![16], &[0x02]);
        let node = ExtensionNode::new(Nibbles::from_hex(vec![0]), Node::from(branch).into());
        let (node, value) = node.remove(trie.db(), Nibbles::from_bytes(&[0x02])).unwrap();
        let Some(Node::Extension(extension)) = node else {
            panic!("expected an extension node");
        };
        assert_eq!(extension.prefix.as_ref(), &[0]);
        assert_eq!(value, Some(vec![0x02]));
    }
}
