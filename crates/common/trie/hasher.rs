use ethereum_types::H256;
use gmpt_rlp::encode::RLPEncode;
use lazy_static::lazy_static;
use sha3::{Digest, Keccak256};

use crate::pool::{Pool, Pooled, Recycle};

/// Idle objects kept per pool.
const POOL_CAPACITY: usize = 256;

lazy_static! {
    static ref HASHER_POOL: Pool<NodeHasher> = Pool::new(POOL_CAPACITY, NodeHasher::default);
    static ref ENCODE_BUFFER_POOL: Pool<Vec<u8>> = Pool::new(POOL_CAPACITY, Vec::new);
}

/// Keccak state plus a scratch buffer for encoding the value being hashed.
#[derive(Default)]
pub struct NodeHasher {
    keccak: Keccak256,
    buffer: Vec<u8>,
}

impl Recycle for NodeHasher {
    fn recycle(&mut self) {
        Digest::reset(&mut self.keccak);
        self.buffer.recycle();
    }
}

impl NodeHasher {
    pub fn hash(&mut self, data: &[u8]) -> H256 {
        Digest::update(&mut self.keccak, data);
        H256(self.keccak.finalize_reset().into())
    }

    /// Hashes the RLP encoding of `value`
    pub fn hash_encoded<T: RLPEncode + ?Sized>(&mut self, value: &T) -> H256 {
        self.buffer.clear();
        value.encode(&mut self.buffer);
        Digest::update(&mut self.keccak, &self.buffer);
        H256(self.keccak.finalize_reset().into())
    }

    /// Hashes `prefix || rlp(value)`, as done for typed envelopes
    pub fn hash_prefixed<T: RLPEncode + ?Sized>(&mut self, prefix: u8, value: &T) -> H256 {
        self.buffer.clear();
        self.buffer.push(prefix);
        value.encode(&mut self.buffer);
        Digest::update(&mut self.keccak, &self.buffer);
        H256(self.keccak.finalize_reset().into())
    }
}

/// Checks a hasher out of the global pool
pub fn hasher() -> Pooled<'static, NodeHasher> {
    HASHER_POOL.get()
}

/// Checks an empty scratch buffer out of the global pool
pub fn encode_buffer() -> Pooled<'static, Vec<u8>> {
    ENCODE_BUFFER_POOL.get()
}

pub fn keccak(data: &[u8]) -> H256 {
    hasher().hash(data)
}

pub fn rlp_hash<T: RLPEncode + ?Sized>(value: &T) -> H256 {
    hasher().hash_encoded(value)
}

pub fn prefixed_rlp_hash<T: RLPEncode + ?Sized>(prefix: u8, value: &T) -> H256 {
    hasher().hash_prefixed(prefix, value)
}
