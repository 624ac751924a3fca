//! Recursive Length Prefix (RLP) encoding and decoding.
//!
//! RLP is the serialization format used for Ethereum state: account records,
//! trie nodes and protocol payloads are all RLP items.
//!
//! - [`encode::RLPEncode`] / [`decode::RLPDecode`]: traits for types with an
//!   RLP representation.
//! - [`structs::Encoder`] / [`structs::Decoder`]: builders for encoding and
//!   decoding structs field by field.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
