use bytes::{BufMut, Bytes};
use ethereum_types::{H256, U256};

use super::constants::{RLP_EMPTY_LIST, RLP_NULL};

/// Function for encoding a value to RLP.
/// For encoding the value into a buffer directly, use [`RLPEncode::encode`].
pub fn encode<T: RLPEncode>(value: T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

/// Calculates the encoded length of an integer given its bit width (ilog2 value) and lsb
#[inline(always)]
const fn impl_length_integers(bits: u32, lsb: u8) -> usize {
    // bits is the 0 based ilog2 result, +8 accounts for the first byte boundary
    let sig_len = (bits + 8) >> 3;
    let is_multibyte_mask = ((sig_len > 1) as usize) | ((lsb > 0x7f) as usize);
    1 + sig_len as usize * is_multibyte_mask
}

/// Number of big endian bytes needed to represent `len`
#[inline]
const fn len_of_len(len: usize) -> usize {
    (len.ilog2() / 8 + 1) as usize
}

/// Computes the length needed for a list with the given payload length
#[inline]
pub const fn list_length(payload_len: usize) -> usize {
    if payload_len < 56 {
        1 + payload_len
    } else {
        1 + len_of_len(payload_len) + payload_len
    }
}

/// Computes the length needed for a byte-string given its length and first byte
#[inline]
pub const fn bytes_length(bytes_len: usize, first_byte: u8) -> usize {
    if bytes_len == 1 && first_byte <= 0x7f {
        return 1;
    }
    if bytes_len < 56 {
        return 1 + bytes_len;
    }
    1 + len_of_len(bytes_len) + bytes_len
}

/// Writes the prefix of a string (`offset = 0x80`) or list (`offset = 0xc0`) of the given payload length.
#[inline]
fn put_prefix(offset: u8, payload_len: usize, buf: &mut dyn BufMut) {
    if payload_len < 56 {
        buf.put_u8(offset + payload_len as u8);
    } else {
        let be = payload_len.to_be_bytes();
        let start = be.len() - len_of_len(payload_len);
        // long form prefixes live 55 positions after the short form base
        buf.put_u8(offset + 55 + (be.len() - start) as u8);
        buf.put_slice(&be[start..]);
    }
}

/// Writes the header of a list whose payload is `total_len` bytes long
#[inline]
pub fn encode_length(total_len: usize, buf: &mut dyn BufMut) {
    put_prefix(RLP_EMPTY_LIST, total_len, buf);
}

/// Struct implementing `BufMut`, but only counting the number of bytes pushed into the buffer.
#[derive(Debug, Clone, Copy, Default)]
struct ByteCounter {
    count: usize,
}

unsafe impl BufMut for ByteCounter {
    fn remaining_mut(&self) -> usize {
        usize::MAX - self.count
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.count += cnt;
    }

    fn chunk_mut(&mut self) -> &mut bytes::buf::UninitSlice {
        unreachable!("every BufMut method used by the encoders is overridden")
    }

    fn put<T: bytes::buf::Buf>(&mut self, src: T)
    where
        Self: Sized,
    {
        self.count += src.remaining();
    }

    fn put_u8(&mut self, _n: u8) {
        self.count += 1;
    }

    fn put_bytes(&mut self, _val: u8, cnt: usize) {
        self.count += cnt;
    }

    fn put_slice(&mut self, src: &[u8]) {
        self.count += src.len()
    }
}

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        // Run `encode` only counting the bytes pushed.
        let mut counter = ByteCounter::default();
        self.encode(&mut counter);
        counter.count
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.length());
        self.encode(&mut buf);
        buf
    }
}

impl RLPEncode for bool {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u8(if *self { 0x01 } else { RLP_NULL });
    }

    #[inline(always)]
    fn length(&self) -> usize {
        1
    }
}

#[inline]
fn impl_encode<const N: usize>(value_be: [u8; N], buf: &mut dyn BufMut) {
    let start = value_be.iter().position(|b| *b != 0).unwrap_or(N);
    // zero is the empty string
    if start == N {
        buf.put_u8(RLP_NULL);
        return;
    }
    let significant = &value_be[start..];
    if significant.len() == 1 && significant[0] <= 0x7f {
        buf.put_u8(significant[0]);
        return;
    }
    buf.put_u8(RLP_NULL + significant.len() as u8);
    buf.put_slice(significant);
}

macro_rules! impl_rlp_encode_uint {
    ($($t:ty),*) => {
        $(
            impl RLPEncode for $t {
                fn encode(&self, buf: &mut dyn BufMut) {
                    impl_encode(self.to_be_bytes(), buf);
                }

                #[inline]
                fn length(&self) -> usize {
                    impl_length_integers(self.checked_ilog2().unwrap_or(0), (*self & 0xff) as u8)
                }
            }
        )*
    };
}

impl_rlp_encode_uint!(u8, u16, u32, u64, u128, usize);

impl RLPEncode for [u8] {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.len() == 1 && self[0] < RLP_NULL {
            buf.put_u8(self[0]);
        } else {
            put_prefix(RLP_NULL, self.len(), buf);
            buf.put_slice(self);
        }
    }

    #[inline]
    fn length(&self) -> usize {
        match self.first() {
            None => 1,
            Some(first) => bytes_length(self.len(), *first),
        }
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_slice().encode(buf)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_slice().length()
    }
}

impl RLPEncode for str {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for &str {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for String {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    #[inline]
    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_ref().length()
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        impl_encode(self.to_big_endian(), buf)
    }

    fn length(&self) -> usize {
        let ilog = self.bits().saturating_sub(1);
        impl_length_integers(ilog as u32, (self.low_u32() & 0xff) as u8)
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    #[inline]
    fn length(&self) -> usize {
        // 32 bytes always take the short string form
        33
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        let payload_len: usize = self.iter().map(|item| item.length()).sum();
        encode_length(payload_len, buf);
        for item in self {
            item.encode(buf);
        }
    }

    #[inline]
    fn length(&self) -> usize {
        list_length(self.iter().map(|item| item.length()).sum())
    }
}

impl<S: RLPEncode, T: RLPEncode> RLPEncode for (S, T) {
    fn encode(&self, buf: &mut dyn BufMut) {
        super::structs::Encoder::new(buf)
            .encode_field(&self.0)
            .encode_field(&self.1)
            .finish();
    }

    #[inline]
    fn length(&self) -> usize {
        list_length(self.0.length() + self.1.length())
    }
}

impl<S: RLPEncode, T: RLPEncode, U: RLPEncode> RLPEncode for (S, T, U) {
    fn encode(&self, buf: &mut dyn BufMut) {
        super::structs::Encoder::new(buf)
            .encode_field(&self.0)
            .encode_field(&self.1)
            .encode_field(&self.2)
            .finish();
    }

    #[inline]
    fn length(&self) -> usize {
        list_length(self.0.length() + self.1.length() + self.2.length())
    }
}

impl<S: RLPEncode, T: RLPEncode, U: RLPEncode, V: RLPEncode> RLPEncode for (S, T, U, V) {
    fn encode(&self, buf: &mut dyn BufMut) {
        super::structs::Encoder::new(buf)
            .encode_field(&self.0)
            .encode_field(&self.1)
            .encode_field(&self.2)
            .encode_field(&self.3)
            .finish();
    }

    #[inline]
    fn length(&self) -> usize {
        list_length(self.0.length() + self.1.length() + self.2.length() + self.3.length())
    }
}
