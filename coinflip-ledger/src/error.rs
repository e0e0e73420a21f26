use crate::commitment::{Commitment, Side};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BetError>;

/// Reasons an operation is rejected.
///
/// Every rejection is raised before the ledger writes anything.
#[derive(Error, Debug)]
pub enum BetError {
    #[error("Commitment {0} is already in use")]
    DuplicateCommitment(Commitment),

    #[error("Stake must be greater than zero")]
    ZeroStake,

    #[error("Bet {0} has already been accepted")]
    AlreadyAccepted(Commitment),

    #[error("No bet exists for commitment {0}")]
    NoSuchBet(Commitment),

    #[error("Stake mismatch: bet requires {expected} sats, {attached} sats attached")]
    StakeMismatch { expected: u64, attached: u64 },

    #[error("Not your bet")]
    NotYourBet,

    #[error("Bet {0} has not been accepted yet")]
    NotYetAccepted(Commitment),

    #[error("Only the acceptor can claim a forfeit")]
    NotAcceptor,

    #[error("Forfeit window is open until {deadline}")]
    TimeoutNotElapsed { deadline: DateTime<Utc> },

    #[error("Bet {0} has already been settled")]
    AlreadySettled(Commitment),

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("Proposer cannot accept their own bet")]
    SelfAcceptance,

    #[error("Secret does not match the {0} commitment")]
    SecretMismatch(Side),

    #[error("The {0} has already revealed")]
    AlreadyRevealed(Side),

    #[error("Reveal your own secret before claiming a forfeit")]
    RevealRequired,

    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupt ledger state: {0}")]
    CorruptState(String),

    #[error("Platform error: {0}")]
    Platform(#[from] coinflip_core::CoinflipError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BetError {
    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::ArithmeticOverflow(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }
}

impl From<rusqlite::Error> for BetError {
    fn from(err: rusqlite::Error) -> Self {
        BetError::Platform(err.into())
    }
}
