use bytes::Bytes;
use ethereum_types::H256;
use mptsync_common::BlockNumber;
use std::{
    collections::HashMap,
    sync::Mutex,
};

use super::api::StoreEngine;
use crate::error::StoreError;

#[derive(Default, Debug)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

#[derive(Default, Debug)]
struct StoreInner {
    // Maps node hashes to their RLP encoding and the block the state belongs to
    trie_nodes: HashMap<H256, (BlockNumber, Vec<u8>)>,
    // Maps code hashes to code
    account_codes: HashMap<H256, Bytes>,
}

impl Store {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self::default())
    }

    fn inner(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockError)
    }
}

impl StoreEngine for Store {
    fn add_trie_node(
        &self,
        node_hash: H256,
        node_rlp: Vec<u8>,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        self.inner()?
            .trie_nodes
            .insert(node_hash, (block_number, node_rlp));
        Ok(())
    }

    fn get_trie_node(&self, node_hash: H256) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .inner()?
            .trie_nodes
            .get(&node_hash)
            .map(|(_, rlp)| rlp.clone()))
    }

    fn add_account_code(&self, code_hash: H256, code: Bytes) -> Result<(), StoreError> {
        self.inner()?.account_codes.insert(code_hash, code);
        Ok(())
    }

    fn get_account_code(&self, code_hash: H256) -> Result<Option<Bytes>, StoreError> {
        Ok(self.inner()?.account_codes.get(&code_hash).cloned())
    }
}
