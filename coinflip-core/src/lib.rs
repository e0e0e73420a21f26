//! coinflip core - the platform a bet ledger runs on
//!
//! Accounts, the escrow pot and the clock, with an in-memory platform for
//! tests and a sqlite-backed one for local use.

pub mod error;
pub mod platform;
pub mod storage;
pub mod types;

pub use error::{CoinflipError, Result};
pub use platform::{MemoryPlatform, Platform};
pub use storage::{AccountStore, SqlitePlatform, Storage};
pub use types::{AccountId, AccountInfo};

pub use ::bitcoin::Amount;
