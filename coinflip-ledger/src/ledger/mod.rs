//! The bet state machine.
//!
//! Each commitment moves `Empty -> Proposed -> Accepted -> Settled`. A
//! [`BetLedger`] holds only configuration: persisted state lives in the
//! [`BetStore`] and funds and time in the [`Platform`], both passed into
//! every call. Every operation checks all of its preconditions before the
//! first write, so a rejected call leaves store and platform untouched.

use crate::bet::{
    AcceptedBet, BetState, CounterCommitment, ProposedBet, RevealOutcome, RevealedSecret,
    Settlement, SettlementOutcome,
};
use crate::commitment::{AgreedRandom, Commitment, Secret, Side};
use crate::config::{LedgerConfig, RevealScheme};
use crate::error::{BetError, Result};
use crate::event::{BetEvent, BetEventKind, SequencedEvent};
use crate::store::BetStore;
use chrono::{DateTime, Duration, Utc};
use coinflip_core::{AccountId, Amount, Platform};

#[derive(Debug, Clone)]
pub struct BetLedger {
    config: LedgerConfig,
    forfeit_window: Duration,
}

impl BetLedger {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let forfeit_window = config.forfeit_window()?;
        Ok(Self {
            config,
            forfeit_window,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Open a bet under `commitment`, escrowing `stake` from the caller.
    pub fn propose<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        stake: Amount,
    ) -> Result<ProposedBet> {
        self.try_propose(store, platform, caller, commitment, stake)
            .inspect_err(|e| tracing::debug!("Propose {} rejected: {}", commitment.short(), e))
    }

    fn try_propose<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        stake: Amount,
    ) -> Result<ProposedBet> {
        if stake == Amount::ZERO {
            return Err(BetError::ZeroStake);
        }

        if store.is_retired(&commitment)? || store.proposed(&commitment)?.is_some() {
            return Err(BetError::DuplicateCommitment(commitment));
        }

        let pot = pot_for(stake)?;
        if pot > platform.max_transfer() {
            return Err(BetError::overflow(format!(
                "pot of {} sats exceeds the platform transfer limit of {} sats",
                pot.to_sat(),
                platform.max_transfer().to_sat()
            )));
        }

        platform.collect(caller, stake)?;

        let now = platform.now();
        let bet = ProposedBet {
            proposer: caller.clone(),
            stake,
            proposed_at: now,
            accepted: false,
        };
        store.put_proposed(&commitment, &bet)?;
        emit(
            store,
            now,
            BetEventKind::Proposed {
                commitment,
                proposer: caller.clone(),
                stake,
            },
        )?;

        tracing::info!(
            "Bet {} proposed by {} for {} sats",
            commitment.short(),
            caller,
            stake.to_sat()
        );
        Ok(bet)
    }

    /// Take the other side of a proposed bet.
    ///
    /// `counter_value` is the acceptor's secret under [`RevealScheme::Basic`]
    /// and the hash of it under [`RevealScheme::TwoSided`].
    pub fn accept<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        counter_value: [u8; 32],
        counter_stake: Amount,
    ) -> Result<AcceptedBet> {
        self.try_accept(store, platform, caller, commitment, counter_value, counter_stake)
            .inspect_err(|e| tracing::debug!("Accept {} rejected: {}", commitment.short(), e))
    }

    fn try_accept<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        counter_value: [u8; 32],
        counter_stake: Amount,
    ) -> Result<AcceptedBet> {
        if store.is_retired(&commitment)? {
            return Err(BetError::AlreadySettled(commitment));
        }

        let mut proposed = store
            .proposed(&commitment)?
            .ok_or(BetError::NoSuchBet(commitment))?;

        if proposed.accepted {
            return Err(BetError::AlreadyAccepted(commitment));
        }

        if proposed.proposer == *caller {
            return Err(BetError::SelfAcceptance);
        }

        if counter_stake != proposed.stake {
            return Err(BetError::StakeMismatch {
                expected: proposed.stake.to_sat(),
                attached: counter_stake.to_sat(),
            });
        }

        platform.collect(caller, counter_stake)?;

        let now = platform.now();
        let counter_commitment = match self.config.scheme {
            RevealScheme::Basic => CounterCommitment::Secret(Secret::from_bytes(counter_value)),
            RevealScheme::TwoSided => {
                CounterCommitment::Sealed(Commitment::from_bytes(counter_value))
            }
        };
        let accepted = AcceptedBet {
            acceptor: caller.clone(),
            accepted_at: now,
            counter_commitment,
            proposer_reveal: None,
            acceptor_reveal: None,
        };
        proposed.accepted = true;

        store.put_accepted(&commitment, &accepted)?;
        store.put_proposed(&commitment, &proposed)?;
        emit(
            store,
            now,
            BetEventKind::Accepted {
                commitment,
                proposer: proposed.proposer.clone(),
                acceptor: caller.clone(),
            },
        )?;

        tracing::info!(
            "Bet {} accepted by {} against {}",
            commitment.short(),
            caller,
            proposed.proposer
        );
        Ok(accepted)
    }

    /// Proposer reveal. The bet is found by hashing `secret`, which is also
    /// what binds the reveal to the proposer.
    pub fn reveal<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        secret: Secret,
    ) -> Result<RevealOutcome> {
        let commitment = secret.commit();
        self.try_reveal(store, platform, caller, commitment, secret)
            .inspect_err(|e| tracing::debug!("Reveal {} rejected: {}", commitment.short(), e))
    }

    fn try_reveal<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        secret: Secret,
    ) -> Result<RevealOutcome> {
        if store.is_retired(&commitment)? {
            return Err(BetError::AlreadySettled(commitment));
        }

        let proposed = store
            .proposed(&commitment)?
            .filter(|bet| bet.proposer == *caller)
            .ok_or(BetError::NotYourBet)?;

        if !proposed.accepted {
            return Err(BetError::NotYetAccepted(commitment));
        }

        let accepted = load_accepted(store, &commitment)?;
        self.record_reveal(
            store,
            platform,
            commitment,
            &proposed,
            accepted,
            Side::Proposer,
            secret,
        )
    }

    /// Reveal by either party against an explicit commitment.
    pub fn reveal_secret<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        secret: Secret,
    ) -> Result<RevealOutcome> {
        self.try_reveal_secret(store, platform, caller, commitment, secret)
            .inspect_err(|e| tracing::debug!("Reveal {} rejected: {}", commitment.short(), e))
    }

    fn try_reveal_secret<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
        secret: Secret,
    ) -> Result<RevealOutcome> {
        let (proposed, accepted) = load_live_accepted(store, &commitment)?;
        let side = side_of(&proposed, &accepted, caller).ok_or(BetError::NotYourBet)?;

        let matches = match (side, accepted.counter_commitment) {
            (Side::Proposer, _) => commitment.verify(&secret),
            (Side::Acceptor, CounterCommitment::Sealed(sealed)) => sealed.verify(&secret),
            (Side::Acceptor, CounterCommitment::Secret(_)) => {
                return Err(BetError::AlreadyRevealed(Side::Acceptor))
            }
        };
        if !matches {
            return Err(BetError::SecretMismatch(side));
        }

        self.record_reveal(store, platform, commitment, &proposed, accepted, side, secret)
    }

    /// Store one side's secret, settling once both secrets are known.
    #[allow(clippy::too_many_arguments)]
    fn record_reveal<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        commitment: Commitment,
        proposed: &ProposedBet,
        mut accepted: AcceptedBet,
        side: Side,
        secret: Secret,
    ) -> Result<RevealOutcome> {
        if accepted.reveal_of(side).is_some() {
            return Err(BetError::AlreadyRevealed(side));
        }

        let now = platform.now();
        let reveal = Some(RevealedSecret {
            secret,
            revealed_at: now,
        });
        match side {
            Side::Proposer => accepted.proposer_reveal = reveal,
            Side::Acceptor => accepted.acceptor_reveal = reveal,
        }

        if let Some((proposer_secret, acceptor_secret)) = accepted.secrets() {
            let agreed_random = AgreedRandom::derive(&proposer_secret, &acceptor_secret);
            let settlement = self.settle(
                store,
                platform,
                commitment,
                proposed,
                &accepted,
                agreed_random.winning_side(),
                SettlementOutcome::Revealed { agreed_random },
            )?;
            return Ok(RevealOutcome::Settled(settlement));
        }

        store.put_accepted(&commitment, &accepted)?;
        emit(store, now, BetEventKind::SecretRevealed { commitment, side })?;

        tracing::info!("Bet {}: {} revealed", commitment.short(), side);
        Ok(RevealOutcome::Pending { side })
    }

    /// Claim the whole pot from a counterparty that failed to reveal in time.
    pub fn forfeit<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
    ) -> Result<Settlement> {
        self.try_forfeit(store, platform, caller, commitment)
            .inspect_err(|e| tracing::debug!("Forfeit {} rejected: {}", commitment.short(), e))
    }

    fn try_forfeit<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        caller: &AccountId,
        commitment: Commitment,
    ) -> Result<Settlement> {
        let (proposed, accepted) = load_live_accepted(store, &commitment)?;
        let (claimant, deadline) = self.forfeit_claim(&proposed, &accepted, caller)?;

        if platform.now() <= deadline {
            return Err(BetError::TimeoutNotElapsed { deadline });
        }

        self.settle(
            store,
            platform,
            commitment,
            &proposed,
            &accepted,
            claimant,
            SettlementOutcome::Forfeited,
        )
    }

    /// Which side `caller` would claim as, and when its window closes.
    fn forfeit_claim(
        &self,
        proposed: &ProposedBet,
        accepted: &AcceptedBet,
        caller: &AccountId,
    ) -> Result<(Side, DateTime<Utc>)> {
        if !accepted.is_sealed() {
            if *caller != accepted.acceptor {
                return Err(BetError::NotAcceptor);
            }
            return Ok((Side::Acceptor, self.deadline_after(accepted.accepted_at)?));
        }

        let side = side_of(proposed, accepted, caller).ok_or(BetError::NotYourBet)?;
        match (accepted.reveal_of(side), accepted.reveal_of(side.other())) {
            (Some(own), None) => {
                let start = own.revealed_at.max(accepted.accepted_at);
                Ok((side, self.deadline_after(start)?))
            }
            // Nobody revealed: the proposer owes the first reveal
            (None, None) if side == Side::Acceptor => {
                Ok((side, self.deadline_after(accepted.accepted_at)?))
            }
            (None, _) => Err(BetError::RevealRequired),
            (Some(_), Some(_)) => Err(BetError::corrupt(
                "both secrets revealed on an unsettled bet",
            )),
        }
    }

    fn deadline_after(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>> {
        start
            .checked_add_signed(self.forfeit_window)
            .ok_or_else(|| BetError::overflow("forfeit deadline out of range"))
    }

    #[allow(clippy::too_many_arguments)]
    fn settle<S: BetStore, P: Platform>(
        &self,
        store: &mut S,
        platform: &mut P,
        commitment: Commitment,
        proposed: &ProposedBet,
        accepted: &AcceptedBet,
        winning_side: Side,
        outcome: SettlementOutcome,
    ) -> Result<Settlement> {
        let payout = pot_for(proposed.stake)?;
        let (winner, loser) = match winning_side {
            Side::Proposer => (proposed.proposer.clone(), accepted.acceptor.clone()),
            Side::Acceptor => (accepted.acceptor.clone(), proposed.proposer.clone()),
        };

        platform.pay(&winner, payout)?;

        let now = platform.now();
        store.remove(&commitment)?;
        store.retire(&commitment, now)?;

        let settlement = Settlement {
            commitment,
            winner,
            loser,
            winning_side,
            stake: proposed.stake,
            payout,
            outcome,
        };
        emit(store, now, BetEventKind::from(&settlement))?;

        if settlement.is_forfeit() {
            tracing::warn!(
                "Bet {} forfeited: {} claims {} sats from {}",
                commitment.short(),
                settlement.winner,
                payout.to_sat(),
                settlement.loser
            );
        } else {
            tracing::info!(
                "Bet {} settled. Winner: {} ({}), {} sats",
                commitment.short(),
                settlement.winner,
                winning_side,
                payout.to_sat()
            );
        }

        Ok(settlement)
    }

    pub fn state<S: BetStore>(&self, store: &S, commitment: &Commitment) -> Result<BetState> {
        if store.is_retired(commitment)? {
            return Ok(BetState::Settled);
        }

        match store.proposed(commitment)? {
            None => Ok(BetState::Empty),
            Some(proposed) if !proposed.accepted => Ok(BetState::Proposed(proposed)),
            Some(proposed) => {
                let accepted = load_accepted(store, commitment)?;
                Ok(BetState::Accepted(proposed, accepted))
            }
        }
    }

    /// When `caller` may first claim a forfeit on an accepted bet.
    pub fn forfeit_deadline<S: BetStore>(
        &self,
        store: &S,
        commitment: &Commitment,
        caller: &AccountId,
    ) -> Result<DateTime<Utc>> {
        let (proposed, accepted) = load_live_accepted(store, commitment)?;
        let (_, deadline) = self.forfeit_claim(&proposed, &accepted, caller)?;
        Ok(deadline)
    }

    pub fn events_since<S: BetStore>(&self, store: &S, after: u64) -> Result<Vec<SequencedEvent>> {
        store.events_since(after)
    }
}

fn pot_for(stake: Amount) -> Result<Amount> {
    stake
        .checked_mul(2)
        .ok_or_else(|| BetError::overflow(format!("doubling {} sats", stake.to_sat())))
}

fn side_of(proposed: &ProposedBet, accepted: &AcceptedBet, caller: &AccountId) -> Option<Side> {
    if *caller == proposed.proposer {
        Some(Side::Proposer)
    } else if *caller == accepted.acceptor {
        Some(Side::Acceptor)
    } else {
        None
    }
}

fn load_accepted<S: BetStore>(store: &S, commitment: &Commitment) -> Result<AcceptedBet> {
    store.accepted(commitment)?.ok_or_else(|| {
        BetError::corrupt(format!(
            "bet {} is marked accepted but has no acceptor record",
            commitment.short()
        ))
    })
}

/// Both records of an accepted, unsettled bet.
fn load_live_accepted<S: BetStore>(
    store: &S,
    commitment: &Commitment,
) -> Result<(ProposedBet, AcceptedBet)> {
    if store.is_retired(commitment)? {
        return Err(BetError::AlreadySettled(*commitment));
    }

    let proposed = store
        .proposed(commitment)?
        .ok_or(BetError::NoSuchBet(*commitment))?;

    if !proposed.accepted {
        return Err(BetError::NotYetAccepted(*commitment));
    }

    let accepted = load_accepted(store, commitment)?;
    Ok((proposed, accepted))
}

fn emit<S: BetStore>(store: &mut S, at: DateTime<Utc>, kind: BetEventKind) -> Result<u64> {
    store.append_event(&BetEvent::new(kind, at))
}
