use crate::{ValueRLP, error::TrieError, nibbles::Nibbles, node::BranchNode};

use super::{ExtensionNode, Node};

/// Leaf Node of an Ethereum Compatible Patricia Merkle Trie
/// Contains the node's remaining path (terminator included) and the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

impl LeafNode {
    /// Creates a new leaf node and stores the given (path, value) pair
    pub fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }

    /// Returns the stored value if the given path matches the stored path
    pub fn get(&self, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        if self.partial == path {
            Ok(Some(self.value.clone()))
        } else {
            Ok(None)
        }
    }

    /// Stores the received value and returns the new root of the subtrie previously consisting of self
    pub fn insert(mut self, path: Nibbles, value: ValueRLP) -> Result<Node, TrieError> {
        /* Possible flow paths:
            Leaf { SelfValue } -> Leaf { Value }
            Leaf { SelfValue } -> Extension { Branch { [Self,...] Value } }
            Leaf { SelfValue } -> Extension { Branch { [ Leaf { Value } , ... ], SelfValue} }
            Leaf { SelfValue } -> Branch { [ Leaf { Value }, Self, ... ], None}
        */
        if self.partial == path {
            self.value = value;
            return Ok(self.into());
        }

        let match_index = path.count_prefix(&self.partial);
        let self_choice = self.partial.at(match_index);
        let new_choice = path.at(match_index);

        let mut branch = BranchNode::default();
        if self_choice == 16 {
            // Branch { [ Leaf { Value } , ... ], SelfValue}
            let new_leaf = LeafNode::new(path.slice(match_index + 1, path.len()), value);
            branch.choices[new_choice] = Node::from(new_leaf).into();
            branch.value = self.value;
        } else if new_choice == 16 {
            // Branch { [Self,...], Value }
            self.partial = self.partial.slice(match_index + 1, self.partial.len());
            branch.choices[self_choice] = Node::from(self).into();
            branch.value = value;
        } else {
            // Branch { [ Leaf { Path, Value }, Self, ... ], None}
            let new_leaf = LeafNode::new(path.slice(match_index + 1, path.len()), value);
            self.partial = self.partial.slice(match_index + 1, self.partial.len());
            branch.choices[new_choice] = Node::from(new_leaf).into();
            branch.choices[self_choice] = Node::from(self).into();
        }

        let final_node = if match_index == 0 {
            branch.into()
        } else {
            // Extension { BranchNode }
            ExtensionNode::new(path.slice(0, match_index), Node::from(branch).into()).into()
        };
        Ok(final_node)
    }

    /// Removes own value if the path corresponds to this node's path
    /// Returns the new root of the subtrie (if any) and the removed value if it existed in the subtrie
    pub fn remove(self, path: Nibbles) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        Ok(if self.partial == path {
            (None, Some(self.value))
        } else {
            (Some(self.into()), None)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Trie, node::NodeRef};

    fn leaf(key: &[u8], value: &[u8]) -> LeafNode {
        LeafNode::new(Nibbles::from_bytes(key), value.to_vec())
    }

    #[test]
    fn get_some() {
        let node = leaf(&[0x12], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(
            node.get(Nibbles::from_bytes(&[0x12])).unwrap(),
            Some(vec![0x12, 0x34, 0x56, 0x78])
        );
    }

    #[test]
    fn get_none() {
        let node = leaf(&[0x12], &[0x12, 0x34, 0x56, 0x78]);
        assert!(node.get(Nibbles::from_bytes(&[0x34])).unwrap().is_none());
    }

    #[test]
    fn insert_replace() {
        let node = leaf(&[0x12], &[0x12, 0x34, 0x56, 0x78]);
        let node = node
            .insert(Nibbles::from_bytes(&[0x12]), vec![0x13])
            .unwrap();
        let Node::Leaf(node) = node else {
            panic!("expected a leaf node");
        };
        assert_eq!(node.value, vec![0x13]);
    }

    #[test]
    fn insert_branch() {
        let trie = Trie::new_temp();
        let node = leaf(&[0x12], &[0x12, 0x34, 0x56, 0x78]);
        let path = Nibbles::from_bytes(&[0x22]);
        let node = node.insert(path.clone(), vec![0x13]).unwrap();
        assert!(matches!(node, Node::Branch(_)));
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x13]));
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x12])).unwrap(),
            Some(vec![0x12, 0x34, 0x56, 0x78])
        );
    }

    #[test]
    fn insert_extension_branch() {
        let trie = Trie::new_temp();
        let node = leaf(&[0x12], &[0x12, 0x34, 0x56, 0x78]);
        let path = Nibbles::from_bytes(&[0x13]);
        let node = node.insert(path.clone(), vec![0x15]).unwrap();
        let Node::Extension(ref extension) = node else {
            panic!("expected an extension node");
        };
        assert_eq!(extension.prefix.as_ref(), &[1]);
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x15]));
    }

    #[test]
    fn insert_extension_branch_value_self() {
        let trie = Trie::new_temp();
        let node = leaf(&[0x12], &[0x12, 0x34, 0x56, 0x78]);
        let path = Nibbles::from_bytes(&[0x12, 0x34]);
        let node = node.insert(path.clone(), vec![0x17]).unwrap();
        let Node::Extension(ref extension) = node else {
            panic!("expected an extension node");
        };
        let NodeRef::Node(ref child, _) = extension.child else {
            panic!("expected an in-memory child");
        };
        let Node::Branch(ref branch) = **child else {
            panic!("expected a branch node");
        };
        // the shorter key ends at the branch
        assert_eq!(branch.value, vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x17]));
    }

    #[test]
    fn insert_extension_branch_value_other() {
        let trie = Trie::new_temp();
        let node = leaf(&[0x12, 0x34], &[0x12, 0x34, 0x56, 0x78]);
        let path = Nibbles::from_bytes(&[0x12]);
        let node = node.insert(path.clone(), vec![0x17]).unwrap();
        assert!(matches!(node, Node::Extension(_)));
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x17]));
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x12, 0x34]))
                .unwrap(),
            Some(vec![0x12, 0x34, 0x56, 0x78])
        );
    }

    #[test]
    fn remove_self() {
        let node = leaf(&[0x12, 0x34], &[0x12, 0x34, 0x56, 0x78]);
        let (node, value) = node.remove(Nibbles::from_bytes(&[0x12, 0x34])).unwrap();
        assert!(node.is_none());
        assert_eq!(value, Some(vec![0x12, 0x34, 0x56, 0x78]));
    }

    #[test]
    fn remove_none() {
        let node = leaf(&[0x12, 0x34], &[0x12, 0x34, 0x56, 0x78]);
        let (node, value) = node.remove(Nibbles::from_bytes(&[0x12])).unwrap();
        assert!(node.is_some());
        assert_eq!(value, None);
    }
}
