use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoinflipError>;

#[derive(Error, Debug)]
pub enum CoinflipError {
    #[error("Insufficient funds: need {need} sats, have {available} sats")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Account not found: {name}")]
    AccountNotFound { name: String },

    #[error("Account already exists: {name}")]
    AccountExists { name: String },

    #[error("Escrow shortfall: need {need} sats, escrow holds {held} sats")]
    EscrowShortfall { need: u64, held: u64 },

    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoinflipError {
    pub fn account_not_found(name: impl Into<String>) -> Self {
        Self::AccountNotFound { name: name.into() }
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::AmountOverflow(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
