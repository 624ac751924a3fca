use mptsync_rlp::structs::Encoder;

use crate::{Nibbles, NodeHash};

/// A node holding a shared path segment leading to a single child.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

impl ExtensionNode {
    pub fn new(prefix: Nibbles, child: NodeHash) -> Self {
        Self { prefix, child }
    }

    /// Encodes the node as a [compact-prefix, child] RLP list.
    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = vec![];
        let encoder = Encoder::new(&mut buf).encode_bytes(&self.prefix.encode_compact());
        match &self.child {
            NodeHash::Hashed(hash) => encoder.encode_bytes(hash.as_bytes()),
            NodeHash::Inline(raw) if raw.is_empty() => encoder.encode_bytes(&[]),
            NodeHash::Inline(raw) => encoder.encode_raw(raw),
        }
        .finish();
        buf
    }
}
