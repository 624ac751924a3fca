use bytes::{BufMut, Bytes};
use ethereum_types::{H256, U256};

use super::constants::RLP_NULL;

/// Trait for encoding a value into RLP.
/// Implementors provide [`encode`](RLPEncode::encode), which appends the
/// encoding to the given buffer.
pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

// Encodes an integer from its big-endian representation, dropping leading
// zeros. Zero itself is the empty string (RLP_NULL).
fn encode_integer<const N: usize>(value_be: [u8; N], buf: &mut dyn BufMut) {
    let mut i = 0;
    while i < N && value_be[i] == 0 {
        i += 1;
    }

    if i == N {
        buf.put_u8(RLP_NULL);
        return;
    }

    let first = value_be[i];

    // A single byte in the [0x00, 0x7f] range is its own RLP encoding.
    if i == N - 1 && first <= 0x7f {
        buf.put_u8(first);
        return;
    }

    let len = N - i;
    buf.put_u8(RLP_NULL + len as u8);
    buf.put_slice(&value_be[i..]);
}

impl RLPEncode for bool {
    fn encode(&self, buf: &mut dyn BufMut) {
        if *self {
            buf.put_u8(0x01);
        } else {
            buf.put_u8(RLP_NULL);
        }
    }
}

impl RLPEncode for u8 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u16 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u32 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for usize {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.len() == 1 && self[0] < RLP_NULL {
            buf.put_u8(self[0]);
        } else {
            let len = self.len();
            if len < 56 {
                buf.put_u8(RLP_NULL + len as u8);
            } else {
                let bytes = len.to_be_bytes();
                let start = bytes.iter().position(|&x| x != 0).unwrap_or(bytes.len() - 1);
                let len_of_len = bytes.len() - start;
                buf.put_u8(0xb7 + len_of_len as u8);
                buf.put_slice(&bytes[start..]);
            }
            buf.put_slice(self);
        }
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let leading_zeros_in_bytes = (self.leading_zeros() / 8) as usize;
        let bytes = self.to_big_endian();
        bytes[leading_zeros_in_bytes..].encode(buf)
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        for item in self {
            item.encode(&mut payload);
        }
        encode_length(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

/// Writes the list prefix for a payload of the given length.
pub fn encode_length(total_len: usize, buf: &mut dyn BufMut) {
    if total_len < 56 {
        buf.put_u8(0xc0 + total_len as u8);
    } else {
        let bytes = total_len.to_be_bytes();
        let start = bytes.iter().position(|&x| x != 0).unwrap_or(bytes.len() - 1);
        let len = bytes.len() - start;
        buf.put_u8(0xf7 + len as u8);
        buf.put_slice(&bytes[start..]);
    }
}
