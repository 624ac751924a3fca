//! Pull-based state sync scheduling for Merkle Patricia Trie backed chains.
//!
//! Given a target state root a node does not yet hold, [`StateScheduler`]
//! tracks every trie node and contract bytecode transitively reachable from
//! that root and hands the missing hashes to a download loop, deepest
//! subtrees first. Fetched nodes are held in memory until all their children
//! are durable, so the store never contains a node whose children it lacks.
//!
//! The scheduler itself performs no I/O and is owned by a single driver;
//! [`download_state`] is such a driver, generic over the peer source.

mod error;
mod fetcher;
mod scheduler;

pub use error::{IgnoredResponse, SyncError};
pub use fetcher::{MAX_RETRIES, NODE_BATCH_SIZE, NodeDataSource, download_state};
pub use scheduler::{
    MAX_TRIE_DEPTH, PendingRequest, RequestKind, StateScheduler, SyncResponse,
};
