use std::{cmp::Ordering, sync::Arc};

use crate::{
    PathRLP, Trie, TrieDB, ValueRLP,
    error::TrieError,
    nibbles::{Nibbles, TERMINATOR},
    node::{Node, NodeRef},
};

/// Depth-first walk over a trie yielding every node together with its full path.
/// Leaf paths include the terminator nibble.
///
/// Iteration stops at the first node that can't be resolved, the error is kept and can be
/// retrieved with [`TrieIterator::take_error`].
pub struct TrieIterator {
    db: Arc<dyn TrieDB>,
    // The stack contains the current traversed path and the next node to be traversed.
    // It proactively stacks all children of a branch after consuming it to reduce accesses to the database.
    // The stack is really used as a convoluted FIFO, so elements are added in the reverse order they will be popped.
    // This avoids extra copies caused by taking elements from the front.
    stack: Vec<(Nibbles, NodeRef)>,
    error: Option<TrieError>,
}

impl TrieIterator {
    pub(crate) fn new(trie: Trie) -> Self {
        let mut stack = Vec::new();
        if trie.root.is_valid() {
            stack.push((Nibbles::default(), trie.root));
        }
        Self {
            db: trie.db,
            stack,
            error: None,
        }
    }

    /// Skips every entry whose key is smaller than `key`
    pub fn advance(&mut self, key: PathRLP) -> Result<(), TrieError> {
        let Some((root_path, root_ref)) = self.stack.pop() else {
            return Ok(());
        };

        fn first_ge(
            db: &dyn TrieDB,
            stacked_nibbles: Nibbles,
            mut nibbles: Nibbles,
            node: NodeRef,
            new_stack: &mut Vec<(Nibbles, NodeRef)>,
        ) -> Result<(), TrieError> {
            let next_node = node.get_child(db, stacked_nibbles.clone())?;
            match &next_node {
                Node::Branch(branch_node) => {
                    let Some(choice) = nibbles.next_choice() else {
                        // the key ends here, the branch and everything below is greater or equal
                        new_stack.push((stacked_nibbles, node));
                        return Ok(());
                    };
                    // Stack the greater siblings first so the matching child is popped before them
                    for i in (choice + 1..16).rev() {
                        let child = &branch_node.choices[i];
                        if child.is_valid() {
                            new_stack.push((stacked_nibbles.append_new(i as u8), child.clone()));
                        }
                    }
                    let child = &branch_node.choices[choice];
                    if child.is_valid() {
                        first_ge(
                            db,
                            stacked_nibbles.append_new(choice as u8),
                            nibbles,
                            child.clone(),
                            new_stack,
                        )?;
                    }
                    Ok(())
                }
                Node::Extension(extension_node) => {
                    let prefix = &extension_node.prefix;
                    match key_order(&nibbles, prefix) {
                        Ordering::Greater => Ok(()),
                        Ordering::Less => {
                            new_stack.push((
                                stacked_nibbles.concat(prefix),
                                extension_node.child.clone(),
                            ));
                            Ok(())
                        }
                        Ordering::Equal => first_ge(
                            db,
                            stacked_nibbles.concat(prefix),
                            nibbles.offset(prefix.len()),
                            extension_node.child.clone(),
                            new_stack,
                        ),
                    }
                }
                Node::Leaf(leaf) => {
                    if key_order(&nibbles, &leaf.partial) != Ordering::Greater {
                        new_stack.push((stacked_nibbles, node));
                    }
                    Ok(())
                }
            }
        }

        /// Compares the common length of both paths in key order, where a key that ends
        /// sorts before any key it is a prefix of
        fn key_order(a: &Nibbles, b: &Nibbles) -> Ordering {
            let rank = |nibble: &u8| (*nibble != TERMINATOR).then_some(*nibble);
            a.as_ref()
                .iter()
                .map(rank)
                .zip(b.as_ref().iter().map(rank))
                .map(|(a, b)| a.cmp(&b))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        }

        let nibbles = Nibbles::from_bytes(&key);
        let mut new_stack = Vec::new();
        first_ge(self.db.as_ref(), root_path, nibbles, root_ref, &mut new_stack)?;
        // Anything below the root was already visited in order, keep popping in the same order
        self.stack.extend(new_stack);
        Ok(())
    }

    /// Returns the error that stopped the iteration, if any
    pub fn take_error(&mut self) -> Option<TrieError> {
        self.error.take()
    }

    /// Yields the stored `(key, value)` pairs in key order
    pub fn content(self) -> impl Iterator<Item = (PathRLP, ValueRLP)> {
        self.filter_map(|(p, n)| match n {
            Node::Branch(branch_node) => {
                (!branch_node.value.is_empty()).then_some((p.to_bytes(), branch_node.value))
            }
            Node::Extension(_) => None,
            Node::Leaf(leaf_node) => Some((p.to_bytes(), leaf_node.value)),
        })
    }
}

impl Iterator for TrieIterator {
    type Item = (Nibbles, Node);

    fn next(&mut self) -> Option<Self::Item> {
        // Fetch the last node in the stack
        let (mut path, next_node_ref) = self.stack.pop()?;
        let next_node = match next_node_ref.get_child(self.db.as_ref(), path.clone()) {
            Ok(node) => node,
            Err(err) => {
                self.error = Some(err);
                self.stack.clear();
                return None;
            }
        };
        match &next_node {
            Node::Branch(branch_node) => {
                // Add all children to the stack (in reverse order so we process first child frist)
                for (choice, child) in branch_node.choices.iter().enumerate().rev() {
                    if child.is_valid() {
                        self.stack
                            .push((path.append_new(choice as u8), child.clone()))
                    }
                }
            }
            Node::Extension(extension_node) => {
                path.extend(&extension_node.prefix);
                self.stack
                    .push((path.clone(), extension_node.child.clone()));
            }
            Node::Leaf(leaf) => {
                path.extend(&leaf.partial);
            }
        }
        Some((path, next_node))
    }
}
