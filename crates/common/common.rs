// Keep H256 and U256 from ethereum_types
pub use bytes::Bytes;
pub use ethereum_types::{H256, U256};

pub mod constants;
pub mod types;

/// Block height a piece of state belongs to.
pub type BlockNumber = u64;
