use ethereum_types::H256;
use sha3::{Digest, Keccak256};

/// A reference to a trie node, as found inside its parent's encoding.
///
/// Nodes whose encoding reaches 32 bytes are referenced by their Keccak-256
/// hash; shorter nodes are embedded verbatim ("inline"). An empty inline
/// value stands for an absent child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeHash {
    Hashed(H256),
    Inline(Vec<u8>),
}

impl NodeHash {
    /// Returns the `NodeHash` of a raw node encoding.
    pub fn from_encoded_raw(encoded: &[u8]) -> NodeHash {
        if encoded.len() >= 32 {
            let hash = Keccak256::new_with_prefix(encoded).finalize();
            NodeHash::Hashed(H256::from_slice(hash.as_slice()))
        } else {
            NodeHash::Inline(encoded.to_vec())
        }
    }

    /// Returns the finalized hash.
    /// NOTE: This will hash inline nodes, only use to obtain a full 32-byte
    /// identity (e.g. a root hash), not for intermediate references.
    pub fn finalize(&self) -> H256 {
        match self {
            NodeHash::Inline(x) => {
                H256::from_slice(Keccak256::new().chain_update(x).finalize().as_slice())
            }
            NodeHash::Hashed(x) => *x,
        }
    }

    /// Returns true if the reference points at an actual child.
    /// An empty inline value is the encoding of "no child here".
    pub fn is_valid(&self) -> bool {
        !matches!(self, NodeHash::Inline(v) if v.is_empty())
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(Vec::new())
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}

impl From<Vec<u8>> for NodeHash {
    fn from(value: Vec<u8>) -> Self {
        match value.len() {
            32 => NodeHash::Hashed(H256::from_slice(&value)),
            _ => NodeHash::Inline(value),
        }
    }
}

impl From<NodeHash> for Vec<u8> {
    fn from(val: NodeHash) -> Self {
        match val {
            NodeHash::Hashed(x) => x.0.to_vec(),
            NodeHash::Inline(x) => x,
        }
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Inline(x) => x.as_ref(),
            NodeHash::Hashed(x) => x.as_bytes(),
        }
    }
}
