use super::{
    constants::{RLP_EMPTY_LIST, RLP_NULL},
    error::RLPDecodeError,
};
use bytes::Bytes;
use ethereum_types::{H256, U256};

/// Max payload size accepted when decoding.
/// No node or item this codec carries comes close to it, so anything bigger is
/// either corrupted storage or a malicious peer.
const MAX_RLP_BYTES: usize = 1024 * 1024 * 1024;

/// Trait for decoding RLP encoded slices of data.
/// See <https://ethereum.org/en/developers/docs/data-structures-and-encoding/rlp/#rlp-decoding> for more information.
/// Implementors provide [`decode_unfinished`](RLPDecode::decode_unfinished), which returns the
/// decoded value along with the bytes that follow it. Consumers usually call
/// [`decode`](RLPDecode::decode), which additionally rejects trailing data.
pub trait RLPDecode: Sized {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::invalid_length());
        }

        Ok(decoded)
    }
}

impl RLPDecode for bool {
    #[inline(always)]
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (first, rest) = buf
            .split_first()
            .ok_or(RLPDecodeError::invalid_length())?;
        let value = match *first {
            RLP_NULL => false,
            0x01 => true,
            b => return Err(RLPDecodeError::malformed_boolean(b)),
        };

        Ok((value, rest))
    }
}

macro_rules! impl_rlp_decode_uint {
    ($($t:ty),*) => {
        $(
            impl RLPDecode for $t {
                fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                    let (bytes, rest) = decode_bytes(rlp)?;
                    // a single byte below 0x80 must be encoded as itself
                    if bytes.len() == 1 && bytes[0] < RLP_NULL && rlp[0] != bytes[0] {
                        return Err(RLPDecodeError::malformed_data());
                    }
                    let padded_bytes = static_left_pad(bytes)?;
                    Ok((<$t>::from_be_bytes(padded_bytes), rest))
                }
            }
        )*
    };
}

impl_rlp_decode_uint!(u8, u16, u32, u64, u128, usize);

// Decodes a byte string of a fixed size. Lists of elements go through the
// Vec<T> implementation (same type) or the tuple implementations (mixed types).
impl<const N: usize> RLPDecode for [u8; N] {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (decoded_bytes, rest) = decode_bytes(rlp)?;
        let value = decoded_bytes
            .try_into()
            .map_err(|_| RLPDecodeError::invalid_length())?;

        Ok((value, rest))
    }
}

impl RLPDecode for Vec<u8> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (decoded, rest) = decode_bytes(rlp)?;
        Ok((decoded.to_vec(), rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (decoded, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(decoded), rest))
    }
}

impl RLPDecode for H256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((H256(value), rest))
    }
}

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let padded_bytes: [u8; 32] = static_left_pad(bytes)?;
        Ok((U256::from_big_endian(&padded_bytes), rest))
    }
}

impl RLPDecode for String {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (str_bytes, rest) = decode_bytes(rlp)?;
        let value =
            String::from_utf8(str_bytes.to_vec()).map_err(|_| RLPDecodeError::malformed_data())?;
        Ok((value, rest))
    }
}

/// Decodes every item of an RLP list into `T`.
/// Kept as a free function since `Vec<u8>` already decodes as a byte string.
pub fn decode_list<T: RLPDecode>(rlp: &[u8]) -> Result<(Vec<T>, &[u8]), RLPDecodeError> {
    let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
    if !is_list {
        return Err(RLPDecodeError::unexpected_string());
    }

    let mut result = Vec::new();
    let mut current_slice = payload;
    while !current_slice.is_empty() {
        let (item, rest_current_list) = T::decode_unfinished(current_slice)?;
        result.push(item);
        current_slice = rest_current_list;
    }

    Ok((result, input_rest))
}

impl<T1: RLPDecode, T2: RLPDecode> RLPDecode for (T1, T2) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::unexpected_string());
        }

        let (first, first_rest) = T1::decode_unfinished(payload)?;
        let (second, second_rest) = T2::decode_unfinished(first_rest)?;
        if !second_rest.is_empty() {
            return Err(RLPDecodeError::malformed_data());
        }

        Ok(((first, second), input_rest))
    }
}

impl<T1: RLPDecode, T2: RLPDecode, T3: RLPDecode> RLPDecode for (T1, T2, T3) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::unexpected_string());
        }
        let (first, first_rest) = T1::decode_unfinished(payload)?;
        let (second, second_rest) = T2::decode_unfinished(first_rest)?;
        let (third, third_rest) = T3::decode_unfinished(second_rest)?;
        if !third_rest.is_empty() {
            return Err(RLPDecodeError::malformed_data());
        }

        Ok(((first, second, third), input_rest))
    }
}

/// Parses the prefix of the item at the start of `data`.
/// Returns whether it is a list, the offset where its payload starts and the payload length.
fn parse_prefix(data: &[u8]) -> Result<(bool, usize, usize), RLPDecodeError> {
    let first_byte = *data.first().ok_or(RLPDecodeError::invalid_length())?;

    let (is_list, header_len, payload_len) = match first_byte {
        0..=0x7F => return Ok((false, 0, 1)),
        0x80..=0xB7 => (false, 1, (first_byte - 0x80) as usize),
        0xB8..=0xBF => {
            let length_of_length = (first_byte - 0xB7) as usize;
            let length_bytes = data
                .get(1..length_of_length + 1)
                .ok_or(RLPDecodeError::invalid_length())?;
            let length = usize::from_be_bytes(static_left_pad(length_bytes)?);
            // long form is only valid for payloads that don't fit the short one
            if length < 56 {
                return Err(RLPDecodeError::malformed_data());
            }
            (false, length_of_length + 1, length)
        }
        RLP_EMPTY_LIST..=0xF7 => (true, 1, (first_byte - RLP_EMPTY_LIST) as usize),
        0xF8..=0xFF => {
            let length_of_length = (first_byte - 0xF7) as usize;
            let length_bytes = data
                .get(1..length_of_length + 1)
                .ok_or(RLPDecodeError::invalid_length())?;
            let length = usize::from_be_bytes(static_left_pad(length_bytes)?);
            if length < 56 {
                return Err(RLPDecodeError::malformed_data());
            }
            (true, length_of_length + 1, length)
        }
    };

    if payload_len > MAX_RLP_BYTES || data.len() < header_len + payload_len {
        return Err(RLPDecodeError::invalid_length());
    }
    Ok((is_list, header_len, payload_len))
}

/// Decodes an RLP item from a slice of bytes.
/// It returns a 3-element tuple with the following elements:
/// - A boolean indicating if the item is a list or not.
/// - The payload of the item, without its prefix.
/// - The remaining bytes after the item.
pub fn decode_rlp_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let (is_list, header_len, payload_len) = parse_prefix(data)?;
    let end = header_len + payload_len;
    Ok((is_list, &data[header_len..end], &data[end..]))
}

/// Splits an RLP item in two:
/// - The first item including its prefix
/// - The remaining bytes after the item
pub fn get_item_with_prefix(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (_, header_len, payload_len) = parse_prefix(data)?;
    Ok(data.split_at(header_len + payload_len))
}

/// Decodes the payload of an RLP string item.
/// It returns a 2-element tuple with the following elements:
/// - The payload of the item.
/// - The remaining bytes after the item.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_rlp_item(data)?;
    if is_list {
        return Err(RLPDecodeError::unexpected_list());
    }
    Ok((payload, rest))
}

/// Pads a slice of bytes with zeros on the left to make it a fixed size array.
/// The data must be canonical (no leading zeros) and at most `N` bytes long.
#[inline]
pub fn static_left_pad<const N: usize>(data: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    let mut result = [0; N];

    if data.is_empty() {
        return Ok(result);
    }
    if data[0] == 0 {
        return Err(RLPDecodeError::malformed_data());
    }
    if data.len() > N {
        return Err(RLPDecodeError::invalid_length());
    }
    result[N - data.len()..].copy_from_slice(data);
    Ok(result)
}
