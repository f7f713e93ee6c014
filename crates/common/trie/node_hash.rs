use bytes::BufMut;
use ethereum_types::H256;
use gmpt_rlp::encode::RLPEncode;

use crate::hasher::keccak;

/// Node encodings at least this long are referenced by their hash, shorter ones are inlined.
pub const INLINE_THRESHOLD: usize = 32;

/// Reference to a node as it appears inside its parent.
///
/// Small nodes are embedded verbatim (`Inline`), the rest are referenced by the
/// keccak hash of their encoding (`Hashed`). An inline reference of length zero is
/// the empty reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeHash {
    Hashed(H256),
    Inline(([u8; 31], u8)),
}

impl NodeHash {
    /// Builds the reference to a node out of its encoding
    pub fn from_encoded(encoded: &[u8]) -> NodeHash {
        if encoded.len() >= INLINE_THRESHOLD {
            NodeHash::Hashed(keccak(encoded))
        } else {
            NodeHash::from_slice(encoded)
        }
    }

    /// Interprets a reference read back from a parent's encoding
    pub fn from_slice(slice: &[u8]) -> NodeHash {
        match slice.len() {
            0..INLINE_THRESHOLD => {
                let mut buffer = [0; 31];
                buffer[0..slice.len()].copy_from_slice(slice);
                NodeHash::Inline((buffer, slice.len() as u8))
            }
            _ => NodeHash::Hashed(H256::from_slice(slice)),
        }
    }

    /// Returns the hash the node is known by outside of its parent.
    /// Inline nodes are hashed here, this is what a root reference always goes through.
    pub fn finalize(self) -> H256 {
        match self {
            NodeHash::Inline(_) => keccak(self.as_ref()),
            NodeHash::Hashed(hash) => hash,
        }
    }

    /// False for the empty reference
    pub fn is_valid(&self) -> bool {
        !matches!(self, NodeHash::Inline((_, 0)))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, NodeHash::Inline(_))
    }

    /// Bytes this reference occupies when written into its parent
    pub fn encoded_len(&self) -> usize {
        match self {
            NodeHash::Hashed(hash) => hash.length(),
            NodeHash::Inline((_, 0)) => 1,
            NodeHash::Inline((_, len)) => *len as usize,
        }
    }

    /// Writes the reference as a parent node item: the hash as a byte string,
    /// an inline node as its raw encoding and the empty reference as an empty string.
    pub fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            NodeHash::Hashed(hash) => hash.encode(buf),
            NodeHash::Inline((_, 0)) => buf.put_u8(gmpt_rlp::constants::RLP_NULL),
            NodeHash::Inline(_) => buf.put_slice(self.as_ref()),
        }
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Inline((slice, len)) => &slice[0..(*len as usize)],
            NodeHash::Hashed(x) => x.as_bytes(),
        }
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(([0; 31], 0))
    }
}
