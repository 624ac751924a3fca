//! Hash-addressed storage for synced state.
//!
//! [`Store`] is a cheap-to-clone facade over a [`StoreEngine`] backend. Trie
//! nodes are keyed by their hash and tagged with the block number the synced
//! state belongs to; contract bytecodes are keyed by code hash.

mod engines;
pub mod error;

use std::sync::Arc;

use bytes::Bytes;
use ethereum_types::H256;
use mptsync_common::BlockNumber;
use tracing::info;

use self::engines::api::StoreEngine;
use self::engines::in_memory::Store as InMemoryStore;
use self::error::StoreError;

#[derive(Debug, Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
}

#[derive(Debug, Clone, Copy)]
pub enum EngineType {
    InMemory,
}

impl Store {
    pub fn new(engine_type: EngineType) -> Result<Self, StoreError> {
        let store = match engine_type {
            EngineType::InMemory => Self {
                engine: Arc::new(InMemoryStore::new()?),
            },
        };
        info!("Started store engine");
        Ok(store)
    }

    /// Persist a trie node under its hash, tagged with the block whose state
    /// it belongs to.
    pub fn add_trie_node(
        &self,
        node_hash: H256,
        node_rlp: Vec<u8>,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        self.engine.add_trie_node(node_hash, node_rlp, block_number)
    }

    /// Fetch a trie node by its hash.
    pub fn get_trie_node(&self, node_hash: H256) -> Result<Option<Vec<u8>>, StoreError> {
        self.engine.get_trie_node(node_hash)
    }

    /// Existence probe for a trie node.
    pub fn contains_trie_node(&self, node_hash: H256) -> Result<bool, StoreError> {
        Ok(self.engine.get_trie_node(node_hash)?.is_some())
    }

    /// Persist a contract bytecode under its code hash.
    pub fn add_account_code(&self, code_hash: H256, code: Bytes) -> Result<(), StoreError> {
        self.engine.add_account_code(code_hash, code)
    }

    /// Fetch a contract bytecode by its code hash.
    pub fn get_account_code(&self, code_hash: H256) -> Result<Option<Bytes>, StoreError> {
        self.engine.get_account_code(code_hash)
    }

    /// Existence probe for a contract bytecode.
    pub fn contains_account_code(&self, code_hash: H256) -> Result<bool, StoreError> {
        Ok(self.engine.get_account_code(code_hash)?.is_some())
    }
}
