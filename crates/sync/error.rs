use ethereum_types::H256;
use mptsync_rlp::error::RLPDecodeError;
use mptsync_storage::error::StoreError;
use thiserror::Error;

/// Errors that end a sync attempt.
///
/// A payload that cannot be structurally interpreted means the peer is buggy
/// or malicious; the driver is expected to drop the scheduler and restart
/// against a different peer rather than retry the same batch.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cannot decode MPT node: {0}")]
    CannotDecodeMptNode(RLPDecodeError),
    #[error("State trie leaf does not hold an account record: {0}")]
    NotAccountLeafNode(RLPDecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Protocol noise that is absorbed without altering scheduler state.
///
/// Neither case can occur with a driver that only delivers data it asked
/// for, but peers are not trusted to behave.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IgnoredResponse {
    #[error("Received data for hash {0:#x} which was never requested")]
    NotRequested(H256),
    #[error("Received data for hash {0:#x} which was already processed")]
    AlreadyProcessed(H256),
}

/// Outcome of processing a single response, before the critical /
/// non-critical split is applied to the whole batch.
#[derive(Debug, Error)]
pub(crate) enum ResponseError {
    #[error(transparent)]
    Critical(#[from] SyncError),
    #[error(transparent)]
    Ignored(#[from] IgnoredResponse),
}
