//! Codec for Ethereum-compatible Merkle Patricia Trie nodes.
//!
//! This crate decodes and encodes individual trie nodes as they travel over
//! the wire or sit in a hash-addressed store. It does not build or navigate
//! tries: consumers work with one node at a time and follow child hashes
//! themselves.

mod nibbles;
mod node;
mod node_hash;

use ethereum_types::H256;
use lazy_static::lazy_static;
use mptsync_rlp::constants::RLP_NULL;
use sha3::{Digest, Keccak256};

pub use self::nibbles::Nibbles;
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node};
pub use self::node_hash::NodeHash;

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = H256::from_slice(
        Keccak256::new()
            .chain_update([RLP_NULL])
            .finalize()
            .as_slice(),
    );
}

/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;
/// RLP-encoded trie node
pub type NodeRLP = Vec<u8>;
