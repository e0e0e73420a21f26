//! The execution environment a bet ledger runs on.
//!
//! A platform owns balances, the escrow pot staked funds sit in between
//! collection and payout, and the clock. Callers are authenticated by the
//! platform before an operation reaches the ledger; the ledger only ever
//! sees an [`AccountId`].

pub mod memory;

pub use memory::MemoryPlatform;

use crate::error::Result;
use crate::types::AccountId;
use bitcoin::Amount;
use chrono::{DateTime, Utc};

pub trait Platform {
    /// Timestamp of the operation currently being executed.
    fn now(&self) -> DateTime<Utc>;

    /// Largest amount a single payout may move.
    fn max_transfer(&self) -> Amount {
        Amount::MAX_MONEY
    }

    /// Move funds attached by `from` into escrow.
    fn collect(&mut self, from: &AccountId, amount: Amount) -> Result<()>;

    /// Release escrowed funds to `to`.
    fn pay(&mut self, to: &AccountId, amount: Amount) -> Result<()>;

    fn escrowed(&self) -> Result<Amount>;
}
