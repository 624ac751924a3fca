use bytes::Bytes;
use ethereum_types::H256;
use mptsync_common::BlockNumber;
use std::fmt::Debug;

use crate::error::StoreError;

pub trait StoreEngine: Debug + Send + Sync {
    /// Add a trie node, keyed by its hash and tagged with the block number
    /// the synced state belongs to
    fn add_trie_node(
        &self,
        node_hash: H256,
        node_rlp: Vec<u8>,
        block_number: BlockNumber,
    ) -> Result<(), StoreError>;

    /// Obtain a trie node via its hash
    fn get_trie_node(&self, node_hash: H256) -> Result<Option<Vec<u8>>, StoreError>;

    /// Add account code, keyed by its hash
    fn add_account_code(&self, code_hash: H256, code: Bytes) -> Result<(), StoreError>;

    /// Obtain account code via its hash
    fn get_account_code(&self, code_hash: H256) -> Result<Option<Bytes>, StoreError>;
}
