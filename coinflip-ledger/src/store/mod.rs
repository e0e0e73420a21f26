pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteBetStore;

use crate::bet::{AcceptedBet, ProposedBet};
use crate::commitment::Commitment;
use crate::error::Result;
use crate::event::{BetEvent, SequencedEvent};
use chrono::{DateTime, Utc};

/// Persisted ledger state: the two bet tables, the retired commitments and
/// the event log.
///
/// The ledger takes a store on every call and never caches anything from
/// it, so one store may be shared by any number of ledgers.
pub trait BetStore {
    fn proposed(&self, commitment: &Commitment) -> Result<Option<ProposedBet>>;

    fn accepted(&self, commitment: &Commitment) -> Result<Option<AcceptedBet>>;

    fn put_proposed(&mut self, commitment: &Commitment, bet: &ProposedBet) -> Result<()>;

    fn put_accepted(&mut self, commitment: &Commitment, bet: &AcceptedBet) -> Result<()>;

    /// Delete both records for `commitment`.
    fn remove(&mut self, commitment: &Commitment) -> Result<()>;

    fn is_retired(&self, commitment: &Commitment) -> Result<bool>;

    fn retire(&mut self, commitment: &Commitment, at: DateTime<Utc>) -> Result<()>;

    /// Append to the event log, returning the new sequence number.
    fn append_event(&mut self, event: &BetEvent) -> Result<u64>;

    /// Events with a sequence number greater than `after`, oldest first.
    fn events_since(&self, after: u64) -> Result<Vec<SequencedEvent>>;

    /// Commitments with a live ProposedBet.
    fn live_commitments(&self) -> Result<Vec<Commitment>>;
}
