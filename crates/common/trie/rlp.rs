// Canonical encoding of trie nodes. The same bytes are hashed, embedded into parents and stored.
use std::array;

use gmpt_rlp::{
    decode::{decode_bytes, decode_rlp_item},
    encode::{RLPEncode, encode_length, list_length},
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::{
    error::TrieError,
    nibbles::Nibbles,
    node::{BranchNode, ExtensionNode, LeafNode, Node},
    node_hash::{INLINE_THRESHOLD, NodeHash},
};

impl BranchNode {
    fn payload_length(&self) -> usize {
        self.choices.iter().fold(
            <[u8] as RLPEncode>::length(&self.value),
            |acc, child| acc + child.compute_hash().encoded_len(),
        )
    }
}

impl RLPEncode for BranchNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        encode_length(self.payload_length(), buf);
        for child in self.choices.iter() {
            child.compute_hash().encode(buf);
        }
        <[u8] as RLPEncode>::encode(&self.value, buf);
    }

    fn length(&self) -> usize {
        list_length(self.payload_length())
    }

    // Preallocates the buffer and avoids computing the payload length twice
    fn encode_to_vec(&self) -> Vec<u8> {
        let payload_len = self.payload_length();
        let mut buf = Vec::with_capacity(list_length(payload_len));
        encode_length(payload_len, &mut buf);
        for child in self.choices.iter() {
            child.compute_hash().encode(&mut buf);
        }
        <[u8] as RLPEncode>::encode(&self.value, &mut buf);
        buf
    }
}

impl RLPEncode for ExtensionNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let mut encoded_child = Vec::new();
        self.child.compute_hash().encode(&mut encoded_child);
        Encoder::new(buf)
            .encode_bytes(&self.prefix.encode_compact())
            .encode_raw(&encoded_child)
            .finish()
    }

    fn length(&self) -> usize {
        let compact_len = <[u8] as RLPEncode>::length(&self.prefix.encode_compact());
        list_length(compact_len + self.child.compute_hash().encoded_len())
    }
}

impl RLPEncode for LeafNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_bytes(&self.partial.encode_compact())
            .encode_bytes(&self.value)
            .finish()
    }

    fn length(&self) -> usize {
        let compact_len = <[u8] as RLPEncode>::length(&self.partial.encode_compact());
        let value_len = <[u8] as RLPEncode>::length(&self.value);
        list_length(compact_len + value_len)
    }
}

impl RLPEncode for Node {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Node::Branch(n) => n.encode(buf),
            Node::Extension(n) => n.encode(buf),
            Node::Leaf(n) => n.encode(buf),
        }
    }

    fn length(&self) -> usize {
        match self {
            Node::Branch(n) => n.length(),
            Node::Extension(n) => n.length(),
            Node::Leaf(n) => n.length(),
        }
    }
}

impl Node {
    /// Decodes a node from its canonical encoding.
    /// The whole input must be consumed by the node.
    pub fn decode(rlp: &[u8]) -> Result<Node, TrieError> {
        let mut items: [&[u8]; 17] = [&[]; 17];
        let mut count = 0;
        let mut decoder = Decoder::new(rlp)?;
        while !decoder.is_done() {
            if count == items.len() {
                return Err(RLPDecodeError::Custom(
                    "Invalid arg count for Node, expected 2 or 17, got more than 17".to_string(),
                )
                .into());
            }
            let item;
            (item, decoder) = decoder.get_encoded_item()?;
            items[count] = item;
            count += 1;
        }
        let rest = decoder.finish()?;
        if !rest.is_empty() {
            return Err(RLPDecodeError::malformed_data().into());
        }

        let node = match count {
            // Leaf or Extension Node
            2 => {
                let (path, _) = decode_bytes(items[0])?;
                let path = Nibbles::decode_compact(path)?;
                if path.is_leaf() {
                    let (value, _) = decode_bytes(items[1])?;
                    LeafNode::new(path, value.to_vec()).into()
                } else {
                    let child = decode_child(items[1])?;
                    if !child.is_valid() {
                        return Err(RLPDecodeError::Custom(
                            "Extension node without a child".to_string(),
                        )
                        .into());
                    }
                    ExtensionNode::new(path, child.into()).into()
                }
            }
            // Branch Node
            17 => {
                let mut choices = array::from_fn(|_| Default::default());
                for (choice, item) in choices.iter_mut().zip(items) {
                    *choice = decode_child(item)?.into();
                }
                let (value, _) = decode_bytes(items[16])?;
                BranchNode::new_with_value(choices, value.to_vec()).into()
            }
            n => {
                return Err(RLPDecodeError::Custom(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {n}"
                ))
                .into());
            }
        };
        Ok(node)
    }
}

/// Decodes a child reference: an empty string, a 32 byte hash or an embedded node
fn decode_child(rlp: &[u8]) -> Result<NodeHash, RLPDecodeError> {
    match decode_rlp_item(rlp)? {
        (false, &[], _) => Ok(NodeHash::default()),
        (false, hash, _) if hash.len() == 32 => Ok(NodeHash::from_slice(hash)),
        (true, _, _) if rlp.len() < INLINE_THRESHOLD => Ok(NodeHash::from_slice(rlp)),
        _ => Err(RLPDecodeError::Custom(
            "Invalid child reference, expected a hash or an embedded node".to_string(),
        )),
    }
}
