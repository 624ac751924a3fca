//! Download loop driving a [`StateScheduler`] against the network.
//!
//! Concurrency lives here, not in the scheduler: the loop may be one of many
//! tasks in a node, but it is the only owner of its scheduler value and
//! serializes take/process/flush on it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::H256;
use mptsync_common::BlockNumber;
use mptsync_storage::Store;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::scheduler::{StateScheduler, SyncResponse};

/// Maximum amount of hashes requested in a single batch
pub const NODE_BATCH_SIZE: usize = 128;
/// Maximum amount of consecutive failed requests before sync is aborted
/// If the max amount of retries is exceeded we will assume the state we are
/// requesting is old and no longer served by our peers
pub const MAX_RETRIES: usize = 10;
/// Pause before re-requesting after a failed attempt
const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Source of state data, typically backed by the connected peer pool.
#[async_trait]
pub trait NodeDataSource {
    /// Requests the preimages of the given hashes (trie nodes or contract
    /// bytecode). `None` means the request failed entirely; an answer
    /// shorter than the request is valid and the remaining hashes will be
    /// re-requested.
    async fn request_node_data(&self, hashes: Vec<H256>) -> Option<Vec<Bytes>>;
}

/// Downloads every trie node and contract bytecode reachable from
/// `target_root` into the store, children always durable before parents.
///
/// Returns `false` if peers stopped serving the state before the download
/// completed (e.g. the pivot became stale); partial progress is flushed, so
/// calling again with the same root resumes where it stopped.
pub async fn download_state<P: NodeDataSource>(
    peers: &P,
    store: Store,
    target_root: H256,
    block_number: BlockNumber,
) -> Result<bool, SyncError> {
    let Some(mut scheduler) = StateScheduler::init(&store, target_root)? else {
        debug!("State for root {target_root:#x} is already present, nothing to sync");
        return Ok(true);
    };
    info!("Syncing state for root {target_root:#x}");

    // Hashes handed out by the scheduler but not yet answered
    let mut in_flight: Vec<H256> = vec![];
    let mut retry_count = 0;
    loop {
        if in_flight.is_empty() {
            let (taken, next) = scheduler.take_missing(NODE_BATCH_SIZE);
            scheduler = next;
            in_flight = taken;
        }
        if in_flight.is_empty() {
            break;
        }
        if retry_count >= MAX_RETRIES {
            warn!("Aborting state sync for root {target_root:#x}: peers stopped answering");
            return Ok(false);
        }
        debug!(
            requested = in_flight.len(),
            backlog = scheduler.missing_count(),
            pending = scheduler.pending_count(),
            "Requesting state data"
        );
        match peers.request_node_data(in_flight.clone()).await {
            Some(blobs) if !blobs.is_empty() => {
                retry_count = 0;
                let answered = blobs.len().min(in_flight.len());
                let responses = in_flight
                    .drain(..answered)
                    .zip(blobs)
                    .map(|(hash, data)| SyncResponse { hash, data })
                    .collect::<Vec<_>>();
                scheduler = scheduler.process_responses(&store, &responses)?;
                scheduler = scheduler.flush(&store, block_number)?;
            }
            _ => {
                retry_count += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    let complete = scheduler.pending_count() == 0;
    if complete {
        info!("State sync complete for root {target_root:#x}");
    } else {
        warn!("State sync for root {target_root:#x} stopped with unresolved requests");
    }
    Ok(complete)
}
