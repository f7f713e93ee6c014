//! Batch interface for building list roots outside the incremental hasher.
//!
//! Keys and values are packed into flat buffers addressed by inclusive `[start, end]` index
//! pairs, the layout taken by hardware accelerated trie builders. A [`BatchRootBuilder`] turns
//! a batch into the same root [`crate::derive_sha::derive_sha`] computes.

use std::{ops::Range, time::Instant};

use ethereum_types::H256;
use gmpt_rlp::encode::RLPEncode;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::{
    Trie, config::ParallelConfig, derive_sha::DerivableList, error::TrieError,
    hasher::encode_buffer, nibbles::Nibbles,
};

/// Kind of trie a batch belongs to
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrieKind {
    State = 0,
    Transaction = 1,
    Receipt = 2,
}

/// Flat buffers holding the entries of a trie.
///
/// Entry `i` has its nibble expanded key (terminator included) at
/// `keys[key_index[2i]..=key_index[2i + 1]]` and its value at
/// `values[value_index[2i]..=value_index[2i + 1]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBatch {
    pub keys: Vec<u8>,
    pub key_index: Vec<i32>,
    pub values: Vec<u8>,
    pub value_index: Vec<i64>,
    pub insert_count: usize,
}

impl HexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocates the index buffers for `entries` entries
    pub fn with_capacity(entries: usize) -> Self {
        Self {
            keys: Vec::with_capacity(entries * 4),
            key_index: Vec::with_capacity(entries * 2),
            values: Vec::new(),
            value_index: Vec::with_capacity(entries * 2),
            insert_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.insert_count
    }

    pub fn is_empty(&self) -> bool {
        self.insert_count == 0
    }

    /// Appends an entry, `hex_key` being nibbles ending with the terminator
    pub fn push(&mut self, hex_key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        if hex_key.is_empty() || value.is_empty() {
            return Err(TrieError::InvalidInput("batch entries can't be empty"));
        }
        let key_start = index_of::<i32>(self.keys.len())?;
        let key_end = index_of::<i32>(self.keys.len() + hex_key.len() - 1)?;
        let value_start = index_of::<i64>(self.values.len())?;
        let value_end = index_of::<i64>(self.values.len() + value.len() - 1)?;

        self.keys.extend_from_slice(hex_key);
        self.key_index.extend([key_start, key_end]);
        self.values.extend_from_slice(value);
        self.value_index.extend([value_start, value_end]);
        self.insert_count += 1;
        Ok(())
    }

    /// Returns the key and value of entry `i`, checking the batch boundaries
    pub fn entry(&self, i: usize) -> Result<(&[u8], &[u8]), TrieError> {
        if i >= self.insert_count {
            return Err(TrieError::InvalidInput("batch entry out of range"));
        }
        let key = bounded(&self.keys, &self.key_index, i)?;
        let value = bounded(&self.values, &self.value_index, i)?;
        Ok((key, value))
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(&[u8], &[u8]), TrieError>> {
        (0..self.insert_count).map(|i| self.entry(i))
    }

    /// Moves the entries of `other` to the end of self, shifting their boundaries past the
    /// current buffers
    pub fn append(&mut self, other: HexBatch) -> Result<(), TrieError> {
        let key_offset = index_of::<i32>(self.keys.len())?;
        let value_offset = index_of::<i64>(self.values.len())?;
        for index in other.key_index {
            let shifted = index
                .checked_add(key_offset)
                .ok_or(TrieError::InvalidInput("batch keys exceed the index range"))?;
            self.key_index.push(shifted);
        }
        for index in other.value_index {
            let shifted = index
                .checked_add(value_offset)
                .ok_or(TrieError::InvalidInput("batch values exceed the index range"))?;
            self.value_index.push(shifted);
        }
        self.keys.extend(other.keys);
        self.values.extend(other.values);
        self.insert_count += other.insert_count;
        Ok(())
    }

    /// Packs the items of `list` in `range`, each under the nibbles of its RLP encoded index
    pub fn collect<L>(list: &L, range: Range<usize>) -> Result<Self, TrieError>
    where
        L: DerivableList + ?Sized,
    {
        let mut batch = Self::with_capacity(range.len());
        let mut key = Vec::with_capacity(9);
        let mut value = encode_buffer();
        for index in range {
            key.clear();
            index.encode(&mut key);
            value.clear();
            list.encode_index(index, &mut value);
            batch.push(Nibbles::from_bytes(&key).as_ref(), &value)?;
        }
        Ok(batch)
    }
}

fn index_of<T: TryFrom<usize>>(position: usize) -> Result<T, TrieError> {
    T::try_from(position).map_err(|_| TrieError::InvalidInput("batch exceeds the index range"))
}

/// Slice addressed by the inclusive boundary pair of entry `i`
fn bounded<'a, T>(buffer: &'a [u8], index: &[T], i: usize) -> Result<&'a [u8], TrieError>
where
    T: Copy + TryInto<usize>,
{
    let malformed = TrieError::InvalidInput("malformed batch boundaries");
    let (Some(start), Some(end)) = (index.get(2 * i), index.get(2 * i + 1)) else {
        return Err(malformed);
    };
    let (Ok(start), Ok(end)) = (
        TryInto::<usize>::try_into(*start),
        TryInto::<usize>::try_into(*end),
    ) else {
        return Err(malformed);
    };
    if start > end {
        return Err(malformed);
    }
    buffer.get(start..=end).ok_or(malformed)
}

/// Builds the root of the trie holding every entry of a batch
pub trait BatchRootBuilder {
    fn build_root(&self, kind: TrieKind, batch: &HexBatch) -> Result<H256, TrieError>;
}

/// Builds batch roots on the CPU with a stateless [`Trie`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBatchBuilder;

impl BatchRootBuilder for SoftwareBatchBuilder {
    fn build_root(&self, kind: TrieKind, batch: &HexBatch) -> Result<H256, TrieError> {
        let mut trie = Trie::stateless();
        for entry in batch.entries() {
            let (key, value) = entry?;
            trie.insert_hex(key, value.to_vec())?;
        }
        let root = trie.hash_no_commit();
        trace!(?kind, entries = batch.len(), "Built batch root");
        Ok(root)
    }
}

/// Same root as [`crate::derive_sha::derive_sha`], built from a single batch
pub fn derive_sha_batched<L, B>(list: &L, kind: TrieKind, builder: &B) -> Result<H256, TrieError>
where
    L: DerivableList + ?Sized,
    B: BatchRootBuilder + ?Sized,
{
    let batch = HexBatch::collect(list, 0..list.len())?;
    builder.build_root(kind, &batch)
}

/// Same as [`derive_sha_batched`] but the batch is packed by several workers, each one
/// collecting a contiguous range of the list. The partial batches are then merged in order.
pub fn derive_sha_batched_parallel<L, B>(
    list: &L,
    kind: TrieKind,
    builder: &B,
    config: &ParallelConfig,
) -> Result<H256, TrieError>
where
    L: DerivableList + Sync + ?Sized,
    B: BatchRootBuilder + ?Sized,
{
    let start = Instant::now();
    let len = list.len();
    let chunks = config.chunk_count(len);
    let chunk_size = config.chunk_size(len);

    let partials = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let range = (chunk * chunk_size).min(len)..((chunk + 1) * chunk_size).min(len);
            HexBatch::collect(list, range)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut batch = HexBatch::with_capacity(len);
    for partial in partials {
        batch.append(partial)?;
    }
    debug!(
        items = len,
        workers = chunks,
        key_bytes = batch.keys.len(),
        value_bytes = batch.values.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Collected trie batch"
    );
    builder.build_root(kind, &batch)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{EMPTY_TRIE_HASH, derive_sha::derive_sha, stack_trie::StackTrie};

    fn items(len: usize) -> Vec<Vec<u8>> {
        (0..len).map(|i| vec![(i % 251) as u8; i % 50 + 1]).collect()
    }

    #[test]
    fn trie_kind_discriminants() {
        assert_eq!(TrieKind::State as i32, 0);
        assert_eq!(TrieKind::Transaction as i32, 1);
        assert_eq!(TrieKind::Receipt as i32, 2);
    }

    #[test]
    fn push_records_inclusive_boundaries() {
        let mut batch = HexBatch::new();
        batch.push(&[8, 0, 16], &[0xaa]).unwrap();
        batch.push(&[0, 1, 16], &[0xbb, 0xcc]).unwrap();
        assert_eq!(batch.key_index, vec![0, 2, 3, 5]);
        assert_eq!(batch.value_index, vec![0, 0, 1, 2]);
        assert_eq!(batch.entry(1).unwrap(), (&[0, 1, 16][..], &[0xbb, 0xcc][..]));
    }

    #[test]
    fn append_shifts_boundaries() {
        let mut first = HexBatch::new();
        first.push(&[8, 0, 16], &[0xaa]).unwrap();
        let mut second = HexBatch::new();
        second.push(&[0, 1, 16], &[0xbb, 0xcc]).unwrap();
        first.append(second).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.key_index, vec![0, 2, 3, 5]);
        assert_eq!(first.value_index, vec![0, 0, 1, 2]);
    }

    #[test]
    fn malformed_boundaries_are_rejected() {
        let mut batch = HexBatch::new();
        batch.push(&[8, 0, 16], &[0xaa]).unwrap();
        batch.value_index[1] = 7;
        assert!(matches!(
            batch.entry(0),
            Err(TrieError::InvalidInput(_))
        ));
        batch.insert_count = 2;
        assert!(matches!(
            SoftwareBatchBuilder.build_root(TrieKind::Transaction, &batch),
            Err(TrieError::InvalidInput(_))
        ));
        assert!(batch.push(&[], &[1]).is_err());
    }

    #[test]
    fn batched_matches_derive_sha() {
        for len in [0, 1, 5, 127, 128, 129, 700] {
            let list = items(len);
            let expected = derive_sha(&list, &mut StackTrie::new()).unwrap();
            assert_eq!(
                derive_sha_batched(&list, TrieKind::Receipt, &SoftwareBatchBuilder).unwrap(),
                expected,
                "len {len}"
            );
        }
    }

    #[test]
    fn parallel_collection_matches_sequential() {
        let config = ParallelConfig::default()
            .with_workers(4)
            .with_min_chunk_size(10);
        for len in [0, 3, 10, 11, 129, 1000] {
            let list = items(len);
            let sequential = HexBatch::collect(&list, 0..len).unwrap();
            let root = derive_sha_batched_parallel(
                &list,
                TrieKind::Transaction,
                &SoftwareBatchBuilder,
                &config,
            )
            .unwrap();
            assert_eq!(
                root,
                SoftwareBatchBuilder
                    .build_root(TrieKind::Transaction, &sequential)
                    .unwrap(),
                "len {len}"
            );
        }
    }

    #[test]
    fn empty_batch_is_empty_trie() {
        assert_eq!(
            SoftwareBatchBuilder
                .build_root(TrieKind::State, &HexBatch::new())
                .unwrap(),
            *EMPTY_TRIE_HASH
        );
    }
}
