use crate::{TrieDB, ValueRLP, error::TrieError, nibbles::Nibbles, node_hash::NodeHash};

use super::{ExtensionNode, LeafNode, Node, NodeRef};

/// Branch Node of an Ethereum Compatible Patricia Merkle Trie
/// Contains the node's value and the hash of its children nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchNode {
    pub choices: [NodeRef; 16],
    pub value: ValueRLP,
}

impl BranchNode {
    /// Creates a new branch node given its children, without any stored value
    pub fn new(choices: [NodeRef; 16]) -> Self {
        Self {
            choices,
            value: Default::default(),
        }
    }

    /// Creates a new branch node given its children and value
    pub fn new_with_value(choices: [NodeRef; 16], value: ValueRLP) -> Self {
        Self { choices, value }
    }

    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        // If path is at the end, return to its own value if present.
        // Otherwise, check the corresponding choice and delegate accordingly if present.
        match path.next_choice() {
            Some(choice) => {
                let child_ref = &self.choices[choice];
                if !child_ref.is_valid() {
                    return Ok(None);
                }
                child_ref.get_child(db, path.current())?.get(db, path)
            }
            None => Ok((!self.value.is_empty()).then(|| self.value.clone())),
        }
    }

    /// Inserts a value into the subtrie originating from this node and returns the new root of the subtrie
    pub fn insert(
        mut self: Box<Self>,
        db: &dyn TrieDB,
        mut path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match path.next_choice() {
            Some(choice) => {
                let child_ref = &mut self.choices[choice];
                let new_child = if child_ref.is_valid() {
                    child_ref
                        .get_child(db, path.current())?
                        .insert(db, path, value)?
                } else {
                    LeafNode::new(path.slice(0, path.len()), value).into()
                };
                *child_ref = new_child.into();
            }
            None => self.value = value,
        }
        Ok(Node::Branch(self))
    }

    /// Removes a value from the subtrie originating from this node given its path
    /// Returns the new root of the subtrie (if any) and the removed value if it existed in the subtrie
    pub fn remove(
        mut self: Box<Self>,
        db: &dyn TrieDB,
        mut path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        /* Possible flow paths:
            Step 1: Removal
                Branch { [ ... ], Value } -> Branch { [...], None } (remove from self)
                Branch { [ childA, ... ], Value } -> Branch { [childA', ... ], Value } (remove from child)

            Step 2: Restructure
                [0 children]
                Branch { [], Value } -> Leaf { Value } (no children, with value)
                [1 child]
                Branch { [ ExtensionChild ], None } -> Extension { ChoiceIndex+ExtensionChildPrefix, ExtensionChildChild }
                Branch { [ BranchChild ], None } -> Extension { ChoiceIndex, BranchChild }
                Branch { [ LeafChild ], None } -> Leaf { ChoiceIndex+LeafChildPartial, LeafChildValue }
                Branch { [ Child ], Value } -> Branch { [ Child ], Value }
                [+1 children]
                Branch { [childA, childB, ... ], _ } -> Branch { [childA, childB, ... ], _ }
        */
        let base_path = path.current();

        // Step 1: Remove value
        let value = match path.next_choice() {
            Some(choice) => {
                if !self.choices[choice].is_valid() {
                    return Ok((Some(Node::Branch(self)), None));
                }
                let child = self.choices[choice].get_child(db, path.current())?;
                let (child, old_value) = child.remove(db, path)?;
                if old_value.is_none() {
                    return Ok((Some(Node::Branch(self)), None));
                }
                self.choices[choice] = match child {
                    Some(child) => child.into(),
                    None => NodeHash::default().into(),
                };
                old_value
            }
            None if self.value.is_empty() => return Ok((Some(Node::Branch(self)), None)),
            None => Some(std::mem::take(&mut self.value)),
        };

        // Step 2: Restructure self
        let mut children = self
            .choices
            .iter()
            .enumerate()
            .filter(|(_, child)| child.is_valid());
        let first_child = children
            .next()
            .map(|(choice, child)| (choice, child.clone()));
        let has_more_children = children.next().is_some();
        let new_node = match (first_child, has_more_children, self.value.is_empty()) {
            // No children left, the value moves to a leaf at this position
            (None, _, false) => Some(LeafNode::new(Nibbles::from_hex(vec![16]), self.value).into()),
            (None, _, true) => None,
            // A single child and no value, merge with the child
            (Some((choice, child_ref)), false, true) => {
                let choice_nibble = choice as u8;
                let child = child_ref.get_child(db, base_path.append_new(choice_nibble))?;
                Some(match child {
                    Node::Branch(_) => ExtensionNode::new(
                        Nibbles::from_hex(vec![choice_nibble]),
                        child_ref,
                    )
                    .into(),
                    Node::Extension(mut extension) => {
                        extension.prefix.prepend(choice_nibble);
                        extension.into()
                    }
                    Node::Leaf(mut leaf) => {
                        leaf.partial.prepend(choice_nibble);
                        leaf.into()
                    }
                })
            }
            _ => Some(Node::Branch(self)),
        };
        Ok((new_node, value))
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
        if let Some(choice) = path.next_choice() {
            let child_ref = &self.choices[choice];
            if child_ref.is_valid() {
                child_ref
                    .get_child(db, path.current())?
                    .get_path(db, path, node_path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Trie;

    fn leaf_ref(key: &[u8], value: &[u8]) -> NodeRef {
        Node::from(LeafNode::new(Nibbles::from_raw(key, true), value.to_vec())).into()
    }

    /// Branch with two leaves below choices 0x0 and 0x1, each with a one nibble remaining key
    fn two_leaf_branch() -> Box<BranchNode> {
        let mut choices: [NodeRef; 16] = Default::default();
        choices[0] = Node::from(LeafNode::new(
            Nibbles::from_hex(vec![0, 16]),
            vec![0x12, 0x34, 0x56, 0x78],
        ))
        .into();
        choices[1] = Node::from(LeafNode::new(
            Nibbles::from_hex(vec![0, 16]),
            vec![0x34, 0x56, 0x78, 0x9a],
        ))
        .into();
        Box::new(BranchNode::new(choices))
    }

    #[test]
    fn new() {
        let node = two_leaf_branch();
        assert_eq!(
            node.choices
                .iter()
                .filter(|child| child.is_valid())
                .count(),
            2
        );
        assert!(node.value.is_empty());
    }

    #[test]
    fn get_some() {
        let trie = Trie::new_temp();
        let node = two_leaf_branch();
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x00])).unwrap(),
            Some(vec![0x12, 0x34, 0x56, 0x78])
        );
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x10])).unwrap(),
            Some(vec![0x34, 0x56, 0x78, 0x9a])
        );
    }

    #[test]
    fn get_none() {
        let trie = Trie::new_temp();
        let node = two_leaf_branch();
        assert_eq!(
            node.get(trie.db(), Nibbles::from_bytes(&[0x20])).unwrap(),
            None
        );
    }

    #[test]
    fn insert_self() {
        let trie = Trie::new_temp();
        let node = two_leaf_branch();
        let path = Nibbles::from_hex(vec![16]);
        let node = node.insert(trie.db(), path.clone(), vec![0x1]).unwrap();
        let Node::Branch(ref branch) = node else {
            panic!("expected a branch node");
        };
        assert_eq!(branch.value, vec![0x1]);
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x1]));
    }

    #[test]
    fn insert_choice() {
        let trie = Trie::new_temp();
        let node = two_leaf_branch();
        let path = Nibbles::from_bytes(&[0x20]);
        let node = node.insert(trie.db(), path.clone(), vec![0x21]).unwrap();
        assert!(matches!(node, Node::Branch(_)));
        assert_eq!(node.get(trie.db(), path).unwrap(), Some(vec![0x21]));
    }

    #[test]
    fn remove_choice_into_inner() {
        let trie = Trie::new_temp();
        let node = two_leaf_branch();
        let (node, value) = node.remove(trie.db(), Nibbles::from_bytes(&[0x00])).unwrap();
        // the surviving leaf absorbs the choice nibble
        let Some(Node::Leaf(leaf)) = node else {
            panic!("expected a leaf node");
        };
        assert_eq!(leaf.partial.as_ref(), &[1, 0, 16]);
        assert_eq!(value, Some(vec![0x12, 0x34, 0x56, 0x78]));
    }

    #[test]
    fn remove_choice() {
        let trie = Trie::new_temp();
        let mut choices: [NodeRef; 16] = Default::default();
        choices[0] = leaf_ref(&[], &[0x00]);
        choices[1] = leaf_ref(&[], &[0x10]);
        choices[2] = leaf_ref(&[], &[0x10]);
        let node = Box::new(BranchNode::new(choices));
        let (node, value) = node.remove(trie.db(), Nibbles::from_hex(vec![0, 16])).unwrap();
        assert!(matches!(node, Some(Node::Branch(_))));
        assert_eq!(value, Some(vec![0x00]));
    }

    #[test]
    fn remove_choice_into_value() {
        let trie = Trie::new_temp();
        let mut choices: [NodeRef; 16] = Default::default();
        choices[0] = leaf_ref(&[], &[0x00]);
        let node = Box::new(BranchNode::new_with_value(choices, vec![0xff]));
        let (node, value) = node.remove(trie.db(), Nibbles::from_hex(vec![0, 16])).unwrap();
        let Some(Node::Leaf(leaf)) = node else {
            panic!("expected a leaf node");
        };
        assert_eq!(leaf.partial.as_ref(), &[16]);
        assert_eq!(leaf.value, vec![0xff]);
        assert_eq!(value, Some(vec![0x00]));
    }

    #[test]
    fn remove_value_into_inner() {
        let trie = Trie::new_temp();
        let mut choices: [NodeRef; 16] = Default::default();
        choices[0] = leaf_ref(&[], &[0x00]);
        let node = Box::new(BranchNode::new_with_value(choices, vec![0xff]));
        let (node, value) = node.remove(trie.db(), Nibbles::from_hex(vec![16])).unwrap();
        let Some(Node::Leaf(leaf)) = node else {
            panic!("expected a leaf node");
        };
        assert_eq!(leaf.partial.as_ref(), &[0, 16]);
        assert_eq!(value, Some(vec![0xff]));
    }

    #[test]
    fn remove_value() {
        let trie = Trie::new_temp();
        let mut choices: [NodeRef; 16] = Default::default();
        choices[0] = leaf_ref(&[], &[0x00]);
        choices[1] = leaf_ref(&[], &[0x10]);
        let node = Box::new(BranchNode::new_with_value(choices, vec![0xff]));
        let (node, value) = node.remove(trie.db(), Nibbles::from_hex(vec![16])).unwrap();
        let Some(Node::Branch(branch)) = node else {
            panic!("expected a branch node");
        };
        assert!(branch.value.is_empty());
        assert_eq!(value, Some(vec![0xff]));
    }

    #[test]
    fn remove_missing_key_keeps_node() {
        let trie = Trie::new_temp();
        let node = two_leaf_branch();
        let (node, value) = node.remove(trie.db(), Nibbles::from_bytes(&[0x30])).unwrap();
        assert_eq!(node, Some(Node::Branch(two_leaf_branch())));
        assert_eq!(value, None);
    }

    #[test]
    fn get_reports_missing_children() {
        let trie = Trie::new_temp();
        let mut choices: [NodeRef; 16] = Default::default();
        let hash = crate::hasher::keccak(b"not stored");
        choices[3] = NodeHash::Hashed(hash).into();
        choices[4] = leaf_ref(&[], &[0x10]);
        let node = BranchNode::new(choices);
        let err = node
            .get(trie.db(), Nibbles::from_hex(vec![3, 16]))
            .unwrap_err();
        let TrieError::MissingNode { path, hash: missing } = err else {
            panic!("expected a missing node error, got {err:?}");
        };
        assert_eq!(path.as_ref(), &[3]);
        assert_eq!(missing, hash);
    }
}
