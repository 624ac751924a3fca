use mptsync_rlp::structs::Encoder;

use crate::{NodeHash, ValueRLP};

/// A node with a slot per nibble value, plus a value for keys ending here.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub choices: [NodeHash; 16],
    pub value: ValueRLP,
}

impl BranchNode {
    pub fn new(choices: [NodeHash; 16]) -> Self {
        Self {
            choices,
            value: Default::default(),
        }
    }

    /// Encodes the node as a 17-item RLP list.
    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = vec![];
        let mut encoder = Encoder::new(&mut buf);
        for child in self.choices.iter() {
            encoder = match child {
                NodeHash::Hashed(hash) => encoder.encode_bytes(hash.as_bytes()),
                // Inlined nodes are stored directly in the parent's encoding;
                // an empty inline ref is the empty string.
                NodeHash::Inline(raw) if raw.is_empty() => encoder.encode_bytes(&[]),
                NodeHash::Inline(raw) => encoder.encode_raw(raw),
            };
        }
        encoder.encode_bytes(&self.value).finish();
        buf
    }
}
