//! Notifications emitted by the ledger.
//!
//! The log is the only way a party learns about a transition it did not
//! submit itself (a proposer finds out its bet was accepted by polling).
//! Every successful transition appends exactly one event.

use crate::bet::{Settlement, SettlementOutcome};
use crate::commitment::{Commitment, Side};
use chrono::{DateTime, Utc};
use coinflip_core::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BetEventKind {
    Proposed {
        commitment: Commitment,
        proposer: AccountId,
        stake: Amount,
    },
    Accepted {
        commitment: Commitment,
        proposer: AccountId,
        acceptor: AccountId,
    },
    SecretRevealed {
        commitment: Commitment,
        side: Side,
    },
    Settled {
        commitment: Commitment,
        winner: AccountId,
        loser: AccountId,
        stake: Amount,
        payout: Amount,
        outcome: SettlementOutcome,
    },
}

impl BetEventKind {
    pub fn commitment(&self) -> &Commitment {
        match self {
            BetEventKind::Proposed { commitment, .. }
            | BetEventKind::Accepted { commitment, .. }
            | BetEventKind::SecretRevealed { commitment, .. }
            | BetEventKind::Settled { commitment, .. } => commitment,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BetEventKind::Proposed { .. } => "bet proposed",
            BetEventKind::Accepted { .. } => "bet accepted",
            BetEventKind::SecretRevealed { .. } => "secret revealed",
            BetEventKind::Settled { outcome, .. } => match outcome {
                SettlementOutcome::Revealed { .. } => "bet settled",
                SettlementOutcome::Forfeited => "bet settled (forfeit)",
            },
        }
    }
}

impl From<&Settlement> for BetEventKind {
    fn from(settlement: &Settlement) -> Self {
        BetEventKind::Settled {
            commitment: settlement.commitment,
            winner: settlement.winner.clone(),
            loser: settlement.loser.clone(),
            stake: settlement.stake,
            payout: settlement.payout,
            outcome: settlement.outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetEvent {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub kind: BetEventKind,
}

impl BetEvent {
    pub fn new(kind: BetEventKind, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at,
            kind,
        }
    }
}

/// An event together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: u64,
    pub event: BetEvent,
}
