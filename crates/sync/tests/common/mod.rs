//! Fixture helpers: hand-built tries served out of maps, standing in for the
//! peers' view of the state.

// each test binary exercises its own subset of these helpers
#![allow(dead_code)]

use bytes::Bytes;
use ethereum_types::{H256, U256};
use mptsync_common::types::{AccountState, code_hash};
use mptsync_rlp::encode::RLPEncode;
use mptsync_storage::Store;
use mptsync_sync::{StateScheduler, SyncResponse};
use mptsync_trie::{BranchNode, ExtensionNode, LeafNode, Nibbles, Node, NodeHash};
use std::collections::{HashMap, HashSet};

/// The full reachable state for a target root, as a peer would serve it.
#[derive(Default)]
pub struct TestState {
    pub nodes: HashMap<H256, Bytes>,
    pub codes: HashMap<H256, Bytes>,
}

impl TestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node and returns its hash.
    pub fn insert_node(&mut self, node: Node) -> H256 {
        let hash = node.compute_hash().finalize();
        self.nodes.insert(hash, node.encode_raw().into());
        hash
    }

    /// Registers a bytecode blob and returns its code hash.
    pub fn insert_code(&mut self, code: &[u8]) -> H256 {
        let code = Bytes::copy_from_slice(code);
        let hash = code_hash(&code);
        self.codes.insert(hash, code);
        hash
    }

    pub fn response_for(&self, hash: H256) -> SyncResponse {
        let data = self
            .nodes
            .get(&hash)
            .or_else(|| self.codes.get(&hash))
            .unwrap_or_else(|| panic!("fixture does not know hash {hash:#x}"))
            .clone();
        SyncResponse { hash, data }
    }

    pub fn responses_for(&self, hashes: &[H256]) -> Vec<SyncResponse> {
        hashes.iter().map(|hash| self.response_for(*hash)).collect()
    }
}

pub fn account_leaf(partial: &[u8], account: &AccountState) -> Node {
    LeafNode::new(Nibbles::from_bytes(partial), account.encode_to_vec()).into()
}

pub fn storage_leaf(partial: &[u8], value: u64) -> Node {
    LeafNode::new(
        Nibbles::from_bytes(partial),
        U256::from(value).encode_to_vec(),
    )
    .into()
}

pub fn branch(children: &[(usize, H256)]) -> Node {
    let mut choices: [NodeHash; 16] = Default::default();
    for (slot, hash) in children {
        choices[*slot] = NodeHash::Hashed(*hash);
    }
    BranchNode::new(choices).into()
}

pub fn extension(prefix: Vec<u8>, child: H256) -> Node {
    ExtensionNode::new(Nibbles::from_hex(prefix), NodeHash::Hashed(child)).into()
}

/// Tiny deterministic generator for the randomized tests; good enough shapes
/// without pulling a full RNG into the fixtures.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        // xorshift must not start at zero
        Self(seed | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n.max(1) as u64) as usize
    }

    pub fn chance(&mut self, one_in: usize) -> bool {
        self.below(one_in) == 0
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            items.swap(i, self.below(i + 1));
        }
    }
}

/// Builds a random account trie with storage tries, bytecodes, shared
/// subtrees and the occasional extension node. Returns the root hash.
pub fn random_state(rng: &mut XorShift, accounts: usize, state: &mut TestState) -> H256 {
    let mut code_pool: Vec<H256> = vec![];
    let mut storage_pool: Vec<H256> = vec![];

    let mut layer: Vec<H256> = (0..accounts)
        .map(|i| {
            let mut account = AccountState {
                nonce: rng.next_u64() % 1000,
                balance: U256::from(rng.next_u64()),
                ..Default::default()
            };
            // bytecode: new, shared from the pool, or none
            if rng.chance(2) {
                if !code_pool.is_empty() && rng.chance(3) {
                    account.code_hash = code_pool[rng.below(code_pool.len())];
                } else {
                    let len = 1 + rng.below(40);
                    let code: Vec<u8> = (0..len).map(|_| rng.next_u64() as u8).collect();
                    let hash = state.insert_code(&code);
                    code_pool.push(hash);
                    account.code_hash = hash;
                }
            }
            // storage trie: new, shared from the pool, or none
            if rng.chance(2) {
                if !storage_pool.is_empty() && rng.chance(3) {
                    account.storage_root = storage_pool[rng.below(storage_pool.len())];
                } else {
                    let root = random_storage_trie(rng, state);
                    storage_pool.push(root);
                    account.storage_root = root;
                }
            }

            let mut partial = [0u8; 32];
            partial[..8].copy_from_slice(&(i as u64).to_be_bytes());
            partial[8..16].copy_from_slice(&rng.next_u64().to_be_bytes());
            state.insert_node(account_leaf(&partial, &account))
        })
        .collect();

    // fold the layer into branches until a single root remains
    while layer.len() > 1 {
        let mut next_layer = vec![];
        let mut chunk_start = 0;
        while chunk_start < layer.len() {
            let chunk_len = (1 + rng.below(4)).min(layer.len() - chunk_start);
            let mut children: Vec<(usize, H256)> = layer
                [chunk_start..chunk_start + chunk_len]
                .iter()
                .enumerate()
                .map(|(slot, hash)| (slot, *hash))
                .collect();
            // occasionally reference an already-placed subtree again, either
            // from a sibling branch or twice from this one
            if rng.chance(3) {
                let shared = layer[rng.below(layer.len())];
                children.push((15, shared));
            }
            let mut node_hash = state.insert_node(branch(&children));
            if rng.chance(5) {
                node_hash = state.insert_node(extension(
                    vec![rng.below(16) as u8, rng.below(16) as u8],
                    node_hash,
                ));
            }
            next_layer.push(node_hash);
            chunk_start += chunk_len;
        }
        layer = next_layer;
    }
    layer[0]
}

fn random_storage_trie(rng: &mut XorShift, state: &mut TestState) -> H256 {
    let leaves = 1 + rng.below(4);
    let children: Vec<(usize, H256)> = (0..leaves)
        .map(|slot| {
            let mut partial = [0u8; 32];
            partial[..8].copy_from_slice(&rng.next_u64().to_be_bytes());
            (slot, state.insert_node(storage_leaf(&partial, rng.next_u64())))
        })
        .collect();
    if leaves == 1 {
        children[0].1
    } else {
        state.insert_node(branch(&children))
    }
}

/// Drives a scheduler to completion against the fixture, answering requests
/// in a randomized order and flushing at random points. Returns every hash
/// handed out by the scheduler, in hand-out order.
pub fn drive_to_completion(
    mut scheduler: StateScheduler,
    store: &Store,
    state: &TestState,
    rng: &mut XorShift,
    max_take: usize,
) -> Vec<H256> {
    let mut outstanding: Vec<H256> = vec![];
    let mut fetched: Vec<H256> = vec![];
    loop {
        let take = 1 + rng.below(max_take);
        let (taken, next) = scheduler.take_missing(take);
        scheduler = next;
        fetched.extend(&taken);
        outstanding.extend(taken);
        if outstanding.is_empty() {
            break;
        }
        rng.shuffle(&mut outstanding);
        let answer = 1 + rng.below(outstanding.len());
        let responses: Vec<SyncResponse> = outstanding
            .drain(..answer)
            .map(|hash| state.response_for(hash))
            .collect();
        scheduler = scheduler
            .process_responses(store, &responses)
            .expect("fixture data always decodes");
        if rng.chance(3) {
            scheduler = scheduler.flush(store, 1).expect("flush");
        }
    }
    let scheduler = scheduler.flush(store, 1).expect("final flush");
    assert_eq!(scheduler.pending_count(), 0);
    assert_eq!(scheduler.missing_count(), 0);
    fetched
}

/// Asserts the store holds exactly the fixture's reachable closure.
pub fn assert_fully_synced(store: &Store, state: &TestState, fetched: &[H256]) {
    for hash in state.nodes.keys() {
        assert!(
            store.contains_trie_node(*hash).unwrap(),
            "missing trie node {hash:#x}"
        );
    }
    for hash in state.codes.keys() {
        assert!(
            store.contains_account_code(*hash).unwrap(),
            "missing bytecode {hash:#x}"
        );
    }
    // each hash is fetched at most once, and nothing outside the closure is
    let unique: HashSet<&H256> = fetched.iter().collect();
    assert_eq!(unique.len(), fetched.len(), "duplicate fetch issued");
    for hash in fetched {
        assert!(
            state.nodes.contains_key(hash) || state.codes.contains_key(hash),
            "fetched {hash:#x} outside the reachable closure"
        );
    }
}
