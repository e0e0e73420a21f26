//! Two-party commit/reveal coin flip
//!
//! The proposer commits to the SHA-256 hash of a 32-byte secret and escrows a
//! stake. An acceptor matches the stake and supplies its own value. Once both
//! secrets are known their XOR decides the winner: even last byte pays the
//! proposer, odd pays the acceptor. A party that goes silent past the forfeit
//! timeout loses the whole pot to the other.
//!
//! Two reveal schemes are supported, see [`RevealScheme`].

pub mod bet;
pub mod commitment;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod store;

pub use bet::{
    AcceptedBet, BetState, CounterCommitment, ProposedBet, RevealOutcome, RevealedSecret,
    Settlement, SettlementOutcome,
};
pub use commitment::{generate_secret, AgreedRandom, Commitment, Secret, Side, SECRET_LEN};
pub use config::{LedgerConfig, RevealScheme};
pub use error::{BetError, Result};
pub use event::{BetEvent, BetEventKind, SequencedEvent};
pub use ledger::BetLedger;
pub use store::{BetStore, MemoryStore, SqliteBetStore};
