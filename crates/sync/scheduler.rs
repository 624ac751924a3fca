//! Dependency-tracked scheduling of state downloads.
//!
//! Every hash the target state transitively references becomes a
//! [`PendingRequest`]. Requests move through three stages:
//! queued (awaiting hand-out to the network), awaiting data, and committed
//! (sitting in the write batch until the next flush). A fetched node only
//! commits once all the children it references are committed or already
//! durable, and committing a node propagates to its parents, so batch and
//! store always satisfy "children before parents" at flush boundaries.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, hash_map::Entry};

use bytes::Bytes;
use ethereum_types::H256;
use mptsync_common::{BlockNumber, constants::EMPTY_KECCACK_HASH, types::AccountState};
use mptsync_rlp::decode::RLPDecode;
use mptsync_storage::Store;
use mptsync_trie::{EMPTY_TRIE_HASH, Node, NodeHash};
use tracing::debug;

use crate::error::{IgnoredResponse, ResponseError, SyncError};

/// Maximum nibble depth of a trie keyed by 32-byte hashes.
///
/// Also the depth assigned to bytecode and storage-root requests spawned by
/// account leaves: it puts them ahead of everything else in the queue so
/// leaves resolve quickly and their bookkeeping can be dropped.
pub const MAX_TRIE_DEPTH: usize = 64;

/// What a pending hash resolves to once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A node of the account trie
    StateNode,
    /// A node of some account's storage trie
    StorageNode,
    /// A contract bytecode blob
    Code,
}

/// Bookkeeping for a hash that is known to be needed but not yet durable.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub hash: H256,
    /// Raw payload, present once a response has been accepted.
    pub data: Option<Bytes>,
    pub kind: RequestKind,
    /// Every parent occurrence waiting on this request. Deliberately not
    /// deduplicated: a parent referencing the same child through two branch
    /// slots must be decremented twice when the child commits.
    pub parents: Vec<H256>,
    /// Nibble depth in the trie; extensions advance it by their prefix
    /// length, not by one.
    pub depth: usize,
    /// Amount of children of this request that are not yet committed.
    pub dependencies: usize,
}

impl PendingRequest {
    pub fn new(hash: H256, kind: RequestKind, parents: Vec<H256>, depth: usize) -> Self {
        Self {
            hash,
            data: None,
            kind,
            parents,
            depth,
            dependencies: 0,
        }
    }
}

/// A payload delivered by the network: the hash it was requested under plus
/// the raw bytes.
#[derive(Debug, Clone)]
pub struct SyncResponse {
    pub hash: H256,
    pub data: Bytes,
}

/// Queue entry: deeper nodes pop first, the hash is an arbitrary but total
/// tie-break so the ordering is consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MissingNode {
    depth: usize,
    hash: H256,
}

impl Ord for MissingNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for MissingNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scheduler for downloading the state reachable from a target root.
///
/// The scheduler is a plain value: the driver-facing operations consume it
/// and return the successor state, so a single owner drives it and there is
/// nothing to interleave with. All I/O goes through the [`Store`] handles
/// passed into the individual operations.
#[derive(Debug)]
pub struct StateScheduler {
    /// Requests still to be fetched or fetched but not yet committable.
    active: HashMap<H256, PendingRequest>,
    /// Scheduled hashes not yet handed to the driver, deepest first.
    queue: BinaryHeap<MissingNode>,
    /// Committed but not yet flushed writes.
    batch: HashMap<H256, (Bytes, RequestKind)>,
}

impl StateScheduler {
    /// Sets up a sync towards `target_root`. Returns `None` when there is
    /// nothing to do: the root is the empty-trie hash or already stored.
    pub fn init(store: &Store, target_root: H256) -> Result<Option<Self>, SyncError> {
        if target_root == *EMPTY_TRIE_HASH {
            return Ok(None);
        }
        if store.contains_trie_node(target_root)? {
            return Ok(None);
        }
        let mut scheduler = Self {
            active: HashMap::new(),
            queue: BinaryHeap::new(),
            batch: HashMap::new(),
        };
        scheduler.schedule(PendingRequest::new(
            target_root,
            RequestKind::StateNode,
            vec![],
            0,
        ));
        Ok(Some(scheduler))
    }

    /// Amount of fetched requests waiting for their children to become
    /// durable before they can commit.
    pub fn pending_count(&self) -> usize {
        self.active
            .values()
            .filter(|request| request.data.is_some())
            .count()
    }

    /// Amount of scheduled hashes not yet handed out.
    pub fn missing_count(&self) -> usize {
        self.queue.len()
    }

    /// Tracks a new request. If the hash is already tracked the in-flight
    /// fetch will serve both: only the parent list grows.
    pub fn schedule(&mut self, request: PendingRequest) {
        match self.active.entry(request.hash) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().parents.extend(request.parents);
            }
            Entry::Vacant(entry) => {
                self.queue.push(MissingNode {
                    depth: request.depth,
                    hash: request.hash,
                });
                entry.insert(request);
            }
        }
    }

    /// Pops up to `max` hashes for the driver to fetch, deepest first.
    /// The requests stay tracked until their data arrives and commits.
    pub fn take_missing(mut self, max: usize) -> (Vec<H256>, Self) {
        let mut hashes = Vec::new();
        while hashes.len() < max {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            // A queued hash may have been satisfied out-of-band if a peer
            // volunteered data for it; handing it out would fetch the node a
            // second time.
            let still_missing = self
                .active
                .get(&entry.hash)
                .is_some_and(|request| request.data.is_none());
            if still_missing {
                hashes.push(entry.hash);
            }
        }
        (hashes, self)
    }

    /// Drains the whole backlog of missing hashes.
    pub fn take_all_missing(self) -> (Vec<H256>, Self) {
        let max = self.queue.len();
        self.take_missing(max)
    }

    /// Folds a batch of responses into the scheduler, in order. Unexpected
    /// responses are dropped; a response that cannot be interpreted aborts
    /// the whole batch and invalidates the scheduler.
    pub fn process_responses(
        mut self,
        store: &Store,
        responses: &[SyncResponse],
    ) -> Result<Self, SyncError> {
        for response in responses {
            match self.process_response(store, response) {
                Ok(()) => {}
                Err(ResponseError::Ignored(ignored)) => {
                    debug!("Dropping response: {ignored}");
                }
                Err(ResponseError::Critical(error)) => return Err(error),
            }
        }
        Ok(self)
    }

    fn process_response(
        &mut self,
        store: &Store,
        response: &SyncResponse,
    ) -> Result<(), ResponseError> {
        let Some(request) = self.active.get(&response.hash) else {
            return Err(IgnoredResponse::NotRequested(response.hash).into());
        };
        if request.data.is_some() {
            return Err(IgnoredResponse::AlreadyProcessed(response.hash).into());
        }

        if request.kind == RequestKind::Code {
            // Bytecode is opaque and has no children: it commits on arrival.
            let request = self
                .active
                .get_mut(&response.hash)
                .expect("request was just looked up");
            request.data = Some(response.data.clone());
            request.dependencies = 0;
            self.commit(response.hash);
            return Ok(());
        }

        let node =
            Node::decode_raw(&response.data).map_err(SyncError::CannotDecodeMptNode)?;
        let children = self.child_requests(store, &node, request)?;

        let request = self
            .active
            .get_mut(&response.hash)
            .expect("request was just looked up");
        request.data = Some(response.data.clone());
        if children.is_empty() && request.dependencies == 0 {
            self.commit(response.hash);
        } else {
            request.dependencies = children.len();
            for child in children {
                self.schedule(child);
            }
        }
        Ok(())
    }

    /// Computes the requests a fetched node fans out into, dropping those
    /// already committed or durable. Children whose fetch is already tracked
    /// are kept: scheduling them again takes the parent-merge path.
    fn child_requests(
        &self,
        store: &Store,
        node: &Node,
        parent: &PendingRequest,
    ) -> Result<Vec<PendingRequest>, SyncError> {
        let children = match node {
            Node::Leaf(leaf) => match parent.kind {
                RequestKind::StateNode => {
                    let account = AccountState::decode(&leaf.value)
                        .map_err(SyncError::NotAccountLeafNode)?;
                    let mut children = vec![];
                    // Bytecode and storage roots jump the queue so account
                    // leaves resolve as soon as possible.
                    if account.code_hash != *EMPTY_KECCACK_HASH {
                        children.push(PendingRequest::new(
                            account.code_hash,
                            RequestKind::Code,
                            vec![parent.hash],
                            MAX_TRIE_DEPTH,
                        ));
                    }
                    if account.storage_root != *EMPTY_TRIE_HASH {
                        children.push(PendingRequest::new(
                            account.storage_root,
                            RequestKind::StorageNode,
                            vec![parent.hash],
                            MAX_TRIE_DEPTH,
                        ));
                    }
                    children
                }
                // Storage leaves hold plain slot values
                _ => vec![],
            },
            Node::Branch(branch) => branch
                .choices
                .iter()
                .filter_map(|child| match child {
                    NodeHash::Hashed(hash) => Some(PendingRequest::new(
                        *hash,
                        parent.kind,
                        vec![parent.hash],
                        parent.depth + 1,
                    )),
                    // Inline children are embedded in this node's encoding
                    NodeHash::Inline(_) => None,
                })
                .collect(),
            Node::Extension(extension) => match &extension.child {
                NodeHash::Hashed(hash) => vec![PendingRequest::new(
                    *hash,
                    parent.kind,
                    vec![parent.hash],
                    parent.depth + extension.prefix.len(),
                )],
                NodeHash::Inline(_) => vec![],
            },
        };

        let mut unknown = Vec::with_capacity(children.len());
        for child in children {
            if !self.is_already_known(store, &child)? {
                unknown.push(child);
            }
        }
        Ok(unknown)
    }

    /// A candidate needs no fetch if its bytes already sit in the write
    /// batch or in the store. The set of tracked fetches is deliberately not
    /// consulted: those go through [`Self::schedule`] so parents merge.
    fn is_already_known(
        &self,
        store: &Store,
        candidate: &PendingRequest,
    ) -> Result<bool, SyncError> {
        if self.batch.contains_key(&candidate.hash) {
            return Ok(true);
        }
        let stored = match candidate.kind {
            RequestKind::Code => store.contains_account_code(candidate.hash)?,
            RequestKind::StateNode | RequestKind::StorageNode => {
                store.contains_trie_node(candidate.hash)?
            }
        };
        Ok(stored)
    }

    /// Moves a finished request into the write batch and propagates the
    /// completion to its parents, cascading into any parent left with no
    /// unresolved children. The trie is a DAG, so the cascade terminates.
    fn commit(&mut self, hash: H256) {
        let request = self
            .active
            .remove(&hash)
            .expect("commit target must be tracked");
        let data = request.data.expect("commit target must hold data");
        self.batch.insert(hash, (data, request.kind));
        for parent_hash in request.parents {
            let parent = self.active.get_mut(&parent_hash).unwrap_or_else(|| {
                panic!("parent {parent_hash:#x} of committed node {hash:#x} is not tracked")
            });
            parent.dependencies -= 1;
            if parent.dependencies == 0 {
                self.commit(parent_hash);
            }
        }
    }

    /// Drains the write batch into the store. Trie nodes are tagged with the
    /// block their state belongs to; bytecode is block-independent.
    pub fn flush(mut self, store: &Store, block_number: BlockNumber) -> Result<Self, SyncError> {
        for (hash, (data, kind)) in self.batch.drain() {
            match kind {
                RequestKind::Code => store.add_account_code(hash, data)?,
                RequestKind::StateNode | RequestKind::StorageNode => {
                    store.add_trie_node(hash, data.to_vec(), block_number)?
                }
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mptsync_rlp::encode::RLPEncode;
    use mptsync_storage::EngineType;
    use mptsync_trie::{BranchNode, LeafNode, Nibbles};

    fn empty_store() -> Store {
        Store::new(EngineType::InMemory).expect("in-memory store")
    }

    fn account_leaf(partial: &[u8]) -> (H256, Bytes) {
        let node: Node = LeafNode::new(
            Nibbles::from_bytes(partial),
            AccountState::default().encode_to_vec(),
        )
        .into();
        (node.compute_hash().finalize(), node.encode_raw().into())
    }

    #[test]
    fn init_is_a_noop_for_the_empty_trie() {
        let store = empty_store();
        assert!(
            StateScheduler::init(&store, *EMPTY_TRIE_HASH)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn init_is_a_noop_for_known_roots() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        store.add_trie_node(root, vec![0x80], 1).unwrap();
        assert!(StateScheduler::init(&store, root).unwrap().is_none());
    }

    #[test]
    fn init_schedules_the_root() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        assert_eq!(scheduler.missing_count(), 1);
        let (hashes, scheduler) = scheduler.take_all_missing();
        assert_eq!(hashes, vec![root]);
        // taking does not untrack
        assert!(scheduler.active.contains_key(&root));
        assert_eq!(scheduler.missing_count(), 0);
    }

    #[test]
    fn scheduling_twice_merges_parents_and_fetches_once() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let mut scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let shared = H256([0x07; 32]);
        scheduler.schedule(PendingRequest::new(
            shared,
            RequestKind::StateNode,
            vec![H256([0xaa; 32])],
            3,
        ));
        scheduler.schedule(PendingRequest::new(
            shared,
            RequestKind::StateNode,
            vec![H256([0xbb; 32]), H256([0xaa; 32])],
            5,
        ));

        assert_eq!(scheduler.active.len(), 2);
        let tracked = scheduler.active.get(&shared).unwrap();
        assert_eq!(
            tracked.parents,
            vec![H256([0xaa; 32]), H256([0xbb; 32]), H256([0xaa; 32])]
        );
        // one queue entry for the shared hash, plus the root
        let (hashes, _) = scheduler.take_all_missing();
        assert_eq!(hashes.iter().filter(|h| **h == shared).count(), 1);
    }

    #[test]
    fn take_missing_pops_deepest_first() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let mut scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let shallow = H256([0x01; 32]);
        let deep = H256([0x02; 32]);
        scheduler.schedule(PendingRequest::new(
            shallow,
            RequestKind::StateNode,
            vec![root],
            2,
        ));
        scheduler.schedule(PendingRequest::new(
            deep,
            RequestKind::Code,
            vec![root],
            MAX_TRIE_DEPTH,
        ));

        let (hashes, scheduler) = scheduler.take_missing(2);
        assert_eq!(hashes, vec![deep, shallow]);
        let (rest, _) = scheduler.take_all_missing();
        assert_eq!(rest, vec![root]);
    }

    #[test]
    fn take_missing_respects_the_cap() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let (hashes, scheduler) = scheduler.take_missing(0);
        assert!(hashes.is_empty());
        assert_eq!(scheduler.missing_count(), 1);
    }

    #[test]
    fn single_account_leaf_commits_immediately() {
        let store = empty_store();
        let (root, leaf_rlp) = account_leaf(&[0xab; 32]);
        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let (hashes, scheduler) = scheduler.take_missing(1);
        assert_eq!(hashes, vec![root]);

        let scheduler = scheduler
            .process_responses(
                &store,
                &[SyncResponse {
                    hash: root,
                    data: leaf_rlp,
                }],
            )
            .unwrap();
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.missing_count(), 0);
        assert_eq!(scheduler.batch.len(), 1);
        assert!(matches!(
            scheduler.batch.get(&root),
            Some((_, RequestKind::StateNode))
        ));
    }

    #[test]
    fn empty_code_blob_commits() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let mut scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let code_hash = mptsync_common::types::code_hash(&Bytes::new());
        scheduler.schedule(PendingRequest::new(
            code_hash,
            RequestKind::Code,
            vec![],
            MAX_TRIE_DEPTH,
        ));

        let scheduler = scheduler
            .process_responses(
                &store,
                &[SyncResponse {
                    hash: code_hash,
                    data: Bytes::new(),
                }],
            )
            .unwrap();
        assert!(matches!(
            scheduler.batch.get(&code_hash),
            Some((data, RequestKind::Code)) if data.is_empty()
        ));
    }

    #[test]
    fn unsolicited_responses_are_dropped() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let scheduler = scheduler
            .process_responses(
                &store,
                &[SyncResponse {
                    hash: H256([0x99; 32]),
                    data: Bytes::from_static(&[0x80]),
                }],
            )
            .unwrap();
        assert_eq!(scheduler.active.len(), 1);
        assert!(scheduler.batch.is_empty());
    }

    #[test]
    fn undecodable_nodes_are_critical() {
        let store = empty_store();
        let root = H256([0x42; 32]);
        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let result = scheduler.process_responses(
            &store,
            &[SyncResponse {
                hash: root,
                data: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
            }],
        );
        assert!(matches!(result, Err(SyncError::CannotDecodeMptNode(_))));
        assert!(!store.contains_trie_node(root).unwrap());
    }

    #[test]
    fn repeated_responses_are_dropped() {
        let store = empty_store();
        // a branch pointing at one child keeps the root pending after its
        // response, so a duplicate can arrive while data is already set
        let (child_hash, _) = account_leaf(&[0xcd; 32]);
        let mut choices: [NodeHash; 16] = Default::default();
        choices[0] = NodeHash::Hashed(child_hash);
        let root_node: Node = BranchNode::new(choices).into();
        let root = root_node.compute_hash().finalize();
        let root_rlp: Bytes = root_node.encode_raw().into();

        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let (_, scheduler) = scheduler.take_missing(1);
        let response = SyncResponse {
            hash: root,
            data: root_rlp,
        };
        let scheduler = scheduler
            .process_responses(&store, &[response.clone(), response])
            .unwrap();
        // the duplicate neither commits nor double-counts the child
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.active.len(), 2);
        assert_eq!(scheduler.active.get(&root).unwrap().dependencies, 1);
        assert_eq!(scheduler.missing_count(), 1);
    }

    #[test]
    fn flush_drains_the_batch_into_the_store() {
        let store = empty_store();
        let (root, leaf_rlp) = account_leaf(&[0xab; 32]);
        let scheduler = StateScheduler::init(&store, root).unwrap().unwrap();
        let (_, scheduler) = scheduler.take_missing(1);
        let scheduler = scheduler
            .process_responses(
                &store,
                &[SyncResponse {
                    hash: root,
                    data: leaf_rlp.clone(),
                }],
            )
            .unwrap();
        let scheduler = scheduler.flush(&store, 9).unwrap();

        assert!(scheduler.batch.is_empty());
        assert_eq!(store.get_trie_node(root).unwrap(), Some(leaf_rlp.to_vec()));
    }
}
