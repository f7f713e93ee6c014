//! Root hash of an indexed list, as used for the transactions and receipts roots of a block.
//!
//! Item `i` is stored under the RLP encoding of `i`.

use std::time::Instant;

use ethereum_types::H256;
use gmpt_rlp::encode::RLPEncode;
use tracing::debug;

use crate::{Trie, error::TrieError, hasher::encode_buffer, stack_trie::StackTrie};

/// Largest index whose RLP encoding is a single byte
const SINGLE_BYTE_INDEX: usize = 0x7f;

/// An ordered list whose root hash can be derived
pub trait DerivableList {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the encoding of the item at `index` into `buf`
    fn encode_index(&self, index: usize, buf: &mut Vec<u8>);
}

impl<T: RLPEncode> DerivableList for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn encode_index(&self, index: usize, buf: &mut Vec<u8>) {
        self[index].encode(buf);
    }
}

impl<T: RLPEncode> DerivableList for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn encode_index(&self, index: usize, buf: &mut Vec<u8>) {
        self.as_slice().encode_index(index, buf);
    }
}

/// Incremental root hash computation fed with `(key, value)` pairs
pub trait TrieHasher {
    fn reset(&mut self);
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError>;
    fn hash(&mut self) -> Result<H256, TrieError>;
}

impl TrieHasher for StackTrie {
    fn reset(&mut self) {
        StackTrie::reset(self)
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        StackTrie::update(self, key, value)
    }

    fn hash(&mut self) -> Result<H256, TrieError> {
        StackTrie::hash(self)
    }
}

impl TrieHasher for Trie {
    fn reset(&mut self) {
        *self = Trie::stateless();
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        self.insert(key.to_vec(), value.to_vec())
    }

    fn hash(&mut self) -> Result<H256, TrieError> {
        Ok(self.hash_no_commit())
    }
}

/// Indexes in the order their RLP encodings sort: `1..=0x7f`, then `0`, then `0x80..`
pub fn derive_order(len: usize) -> impl Iterator<Item = usize> {
    let single_byte = 1..len.min(SINGLE_BYTE_INDEX + 1);
    let zero = (len > 0).then_some(0);
    let rest = SINGLE_BYTE_INDEX + 1..len;
    single_byte.chain(zero).chain(rest)
}

/// Computes the root of the trie mapping `rlp(i)` to the encoding of `list[i]`.
/// Keys reach the hasher in increasing byte order, so any [`TrieHasher`] can be used.
pub fn derive_sha<L, H>(list: &L, hasher: &mut H) -> Result<H256, TrieError>
where
    L: DerivableList + ?Sized,
    H: TrieHasher + ?Sized,
{
    let start = Instant::now();
    hasher.reset();

    let mut value = encode_buffer();
    let mut key = Vec::with_capacity(9);
    for index in derive_order(list.len()) {
        key.clear();
        index.encode(&mut key);
        value.clear();
        list.encode_index(index, &mut value);
        hasher.update(&key, &value)?;
    }
    let root = hasher.hash()?;

    debug!(
        items = list.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Derived list root"
    );
    Ok(root)
}
