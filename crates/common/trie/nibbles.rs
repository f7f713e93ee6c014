use std::cmp;

use smallvec::SmallVec;

use crate::error::TrieError;

/// Nibble value marking the end of a key. Only ever found as the last nibble of a path.
pub const TERMINATOR: u8 = 16;

/// Inline capacity covering a 32 byte hashed key plus its terminator.
type NibbleBuf = SmallVec<[u8; 66]>;

/// Nibble sequence used to address nodes in the trie.
///
/// `data` holds the nibbles still to be matched while `already_consumed` keeps the
/// nibbles walked so far, so the full path of a node is always at hand when it is
/// committed or resolved from the store.
#[derive(Debug, Clone, Default)]
pub struct Nibbles {
    data: NibbleBuf,
    already_consumed: NibbleBuf,
}

// NOTE: custom impls to ignore the `already_consumed` field

impl PartialEq for Nibbles {
    fn eq(&self, other: &Nibbles) -> bool {
        self.data == other.data
    }
}

impl Eq for Nibbles {}

impl PartialOrd for Nibbles {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Nibbles {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.data.cmp(&other.data)
    }
}

impl std::hash::Hash for Nibbles {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl Nibbles {
    /// Create `Nibbles` from hex-encoded nibbles
    pub fn from_hex(hex: Vec<u8>) -> Self {
        Self::from_slice(&hex)
    }

    /// Create `Nibbles` from a nibble slice
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: NibbleBuf::from_slice(data),
            already_consumed: NibbleBuf::new(),
        }
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag (a 16 nibble at the end)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_raw(bytes, true)
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag if `is_leaf` is true
    pub fn from_raw(bytes: &[u8], is_leaf: bool) -> Self {
        let mut data = NibbleBuf::with_capacity(bytes.len() * 2 + 1);
        for byte in bytes {
            data.push(byte >> 4);
            data.push(byte & 0x0F);
        }
        if is_leaf {
            data.push(TERMINATOR);
        }
        Self {
            data,
            already_consumed: NibbleBuf::new(),
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.into_vec()
    }

    /// Returns the amount of nibbles left to match
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no nibbles left to match
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// If `prefix` is a prefix of self, move the offset after
    /// the prefix and return true, otherwise return false.
    pub fn skip_prefix(&mut self, prefix: &Nibbles) -> bool {
        if self.data.starts_with(&prefix.data) {
            self.already_consumed.extend_from_slice(&prefix.data);
            self.data.drain(..prefix.len());
            true
        } else {
            false
        }
    }

    /// Compares self to another, comparing prefixes only in case of unequal lengths.
    pub fn compare_prefix(&self, prefix: &Nibbles) -> cmp::Ordering {
        let shared = self.len().min(prefix.len());
        self.data[..shared].cmp(&prefix.data[..shared])
    }

    /// Returns the amount of leading nibbles shared by self and other
    pub fn count_prefix(&self, other: &Nibbles) -> usize {
        self.data
            .iter()
            .zip(other.data.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Removes and returns the first nibble
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<u8> {
        if self.data.is_empty() {
            return None;
        }
        let nibble = self.data.remove(0);
        self.already_consumed.push(nibble);
        Some(nibble)
    }

    /// Removes and returns the first nibble if it is a suitable choice index (aka < 16)
    pub fn next_choice(&mut self) -> Option<usize> {
        self.next()
            .filter(|choice| *choice < TERMINATOR)
            .map(usize::from)
    }

    /// Returns the nibbles after the given offset, recording the skipped ones as consumed
    pub fn offset(&self, offset: usize) -> Nibbles {
        let mut already_consumed = self.already_consumed.clone();
        already_consumed.extend_from_slice(&self.data[..offset]);
        Nibbles {
            data: NibbleBuf::from_slice(&self.data[offset..]),
            already_consumed,
        }
    }

    /// Returns the nibbles between the start and end indexes
    pub fn slice(&self, start: usize, end: usize) -> Nibbles {
        Nibbles::from_slice(&self.data[start..end])
    }

    /// Extends the nibbles with another list of nibbles
    pub fn extend(&mut self, other: &Nibbles) {
        self.data.extend_from_slice(&other.data);
    }

    /// Return the nibble at the given index, will panic if the index is out of range
    pub fn at(&self, i: usize) -> usize {
        self.data[i] as usize
    }

    /// Inserts a nibble at the start
    pub fn prepend(&mut self, nibble: u8) {
        self.data.insert(0, nibble);
    }

    /// Inserts a nibble at the end
    pub fn append(&mut self, nibble: u8) {
        self.data.push(nibble);
    }

    /// Returns a copy of self with the nibble added at the end
    pub fn append_new(&self, nibble: u8) -> Nibbles {
        let mut appended = self.clone();
        appended.append(nibble);
        appended
    }

    /// Concatenates self and another Nibbles returning a new Nibbles
    pub fn concat(&self, other: &Nibbles) -> Nibbles {
        let mut concatenated = self.clone();
        concatenated.extend(other);
        concatenated
    }

    /// Returns true if the nibbles end with the leaf flag
    pub fn is_leaf(&self) -> bool {
        self.data.last() == Some(&TERMINATOR)
    }

    /// Encodes the nibbles in hex-prefix (compact) form.
    ///
    /// node type    path length    |    prefix    hexchar
    /// --------------------------------------------------
    /// extension    even           |    0000      0x0
    /// extension    odd            |    0001      0x1
    /// leaf         even           |    0010      0x2
    /// leaf         odd            |    0011      0x3
    pub fn encode_compact(&self) -> Vec<u8> {
        let is_leaf = self.is_leaf();
        let mut hex = if is_leaf {
            &self.data[..self.data.len() - 1]
        } else {
            &self.data[..]
        };
        let mut compact = Vec::with_capacity(hex.len() / 2 + 1);

        let mut flag = if is_leaf { 0x20 } else { 0x00 };
        if hex.len() % 2 == 1 {
            flag += 0x10 + hex[0];
            hex = &hex[1..];
        }
        compact.push(flag);
        compact.extend(hex.chunks_exact(2).map(|pair| pair[0] << 4 | pair[1]));
        compact
    }

    /// Decodes a hex-prefix (compact) encoded path.
    /// The leaf flag is restored as a trailing terminator, see [`Nibbles::is_leaf`].
    pub fn decode_compact(compact: &[u8]) -> Result<Self, TrieError> {
        let (prefix, rest) = compact
            .split_first()
            .ok_or(TrieError::MalformedCompactPath("empty path"))?;
        let flag = prefix >> 4;
        if flag > 3 {
            return Err(TrieError::MalformedCompactPath("unknown flag nibble"));
        }
        let is_odd = flag & 1 == 1;
        let is_leaf = flag & 2 == 2;
        if !is_odd && prefix & 0x0F != 0 {
            return Err(TrieError::MalformedCompactPath(
                "padding nibble set on an even length path",
            ));
        }

        let mut data = NibbleBuf::with_capacity(rest.len() * 2 + 2);
        if is_odd {
            data.push(prefix & 0x0F);
        }
        for byte in rest {
            data.push(byte >> 4);
            data.push(byte & 0x0F);
        }
        if is_leaf {
            data.push(TERMINATOR);
        }
        Ok(Self {
            data,
            already_consumed: NibbleBuf::new(),
        })
    }

    /// Combines the nibbles into bytes, trimming the leaf flag if necessary
    pub fn to_bytes(&self) -> Vec<u8> {
        let trimmed = if self.is_leaf() {
            &self.data[..self.data.len() - 1]
        } else {
            &self.data[..]
        };
        trimmed
            .chunks(2)
            .map(|chunk| match chunk.len() {
                1 => chunk[0] << 4,
                _ => chunk[0] << 4 | chunk[1],
            })
            .collect()
    }

    /// Return already consumed parts of path
    pub fn current(&self) -> Nibbles {
        Nibbles::from_slice(&self.already_consumed)
    }

    /// Empties `self` and returns the content
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl AsRef<[u8]> for Nibbles {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
