mod account;

pub use account::{AccountState, code_hash};
