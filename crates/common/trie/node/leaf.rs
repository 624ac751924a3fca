use mptsync_rlp::structs::Encoder;

use crate::{Nibbles, ValueRLP};

/// A node holding the remainder of a key and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

impl LeafNode {
    pub fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }

    /// Encodes the node as a [compact-partial, value] RLP list.
    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = vec![];
        Encoder::new(&mut buf)
            .encode_bytes(&self.partial.encode_compact())
            .encode_bytes(&self.value)
            .finish();
        buf
    }
}
