use crate::commitment::{AgreedRandom, Commitment, Secret, Side};
use coinflip_core::{AccountId, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side A's half of a bet, written by Propose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedBet {
    pub proposer: AccountId,
    pub stake: Amount,
    pub proposed_at: DateTime<Utc>,
    pub accepted: bool,
}

/// What side B supplied at Accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterCommitment {
    /// Basic scheme: B's secret in the clear.
    Secret(Secret),
    /// Two-sided scheme: only the hash of B's secret.
    Sealed(Commitment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedSecret {
    pub secret: Secret,
    pub revealed_at: DateTime<Utc>,
}

/// Side B's half of a bet, written by Accept and updated only by reveals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBet {
    pub acceptor: AccountId,
    pub accepted_at: DateTime<Utc>,
    pub counter_commitment: CounterCommitment,
    pub proposer_reveal: Option<RevealedSecret>,
    pub acceptor_reveal: Option<RevealedSecret>,
}

impl AcceptedBet {
    pub fn is_sealed(&self) -> bool {
        matches!(self.counter_commitment, CounterCommitment::Sealed(_))
    }

    pub fn reveal_of(&self, side: Side) -> Option<&RevealedSecret> {
        match side {
            Side::Proposer => self.proposer_reveal.as_ref(),
            Side::Acceptor => self.acceptor_reveal.as_ref(),
        }
    }

    /// Both secrets, once known.
    pub fn secrets(&self) -> Option<(Secret, Secret)> {
        let proposer = self.proposer_reveal?.secret;
        let acceptor = match self.counter_commitment {
            CounterCommitment::Secret(secret) => secret,
            CounterCommitment::Sealed(_) => self.acceptor_reveal?.secret,
        };
        Some((proposer, acceptor))
    }
}

/// Where a commitment is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BetState {
    Empty,
    Proposed(ProposedBet),
    Accepted(ProposedBet, AcceptedBet),
    /// Settled and retired; the commitment can never be proposed again.
    Settled,
}

impl BetState {
    pub fn label(&self) -> &'static str {
        match self {
            BetState::Empty => "Empty",
            BetState::Proposed(_) => "Proposed",
            BetState::Accepted(..) => "Accepted",
            BetState::Settled => "Settled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    Revealed { agreed_random: AgreedRandom },
    Forfeited,
}

/// Result of settling a bet, returned to the caller that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub commitment: Commitment,
    pub winner: AccountId,
    pub loser: AccountId,
    pub winning_side: Side,
    pub stake: Amount,
    pub payout: Amount,
    pub outcome: SettlementOutcome,
}

impl Settlement {
    pub fn is_forfeit(&self) -> bool {
        matches!(self.outcome, SettlementOutcome::Forfeited)
    }
}

/// Result of a reveal on a two-sided bet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Recorded; still waiting on the other side.
    Pending { side: Side },
    Settled(Settlement),
}
