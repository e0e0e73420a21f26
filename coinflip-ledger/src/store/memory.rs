use crate::bet::{AcceptedBet, ProposedBet};
use crate::commitment::Commitment;
use crate::error::Result;
use crate::event::{BetEvent, SequencedEvent};
use crate::store::BetStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// In-memory store. Clone it to snapshot the whole ledger state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    proposed: HashMap<Commitment, ProposedBet>,
    accepted: HashMap<Commitment, AcceptedBet>,
    retired: HashMap<Commitment, DateTime<Utc>>,
    events: Vec<SequencedEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SequencedEvent] {
        &self.events
    }
}

impl BetStore for MemoryStore {
    fn proposed(&self, commitment: &Commitment) -> Result<Option<ProposedBet>> {
        Ok(self.proposed.get(commitment).cloned())
    }

    fn accepted(&self, commitment: &Commitment) -> Result<Option<AcceptedBet>> {
        Ok(self.accepted.get(commitment).cloned())
    }

    fn put_proposed(&mut self, commitment: &Commitment, bet: &ProposedBet) -> Result<()> {
        self.proposed.insert(*commitment, bet.clone());
        Ok(())
    }

    fn put_accepted(&mut self, commitment: &Commitment, bet: &AcceptedBet) -> Result<()> {
        self.accepted.insert(*commitment, bet.clone());
        Ok(())
    }

    fn remove(&mut self, commitment: &Commitment) -> Result<()> {
        self.proposed.remove(commitment);
        self.accepted.remove(commitment);
        Ok(())
    }

    fn is_retired(&self, commitment: &Commitment) -> Result<bool> {
        Ok(self.retired.contains_key(commitment))
    }

    fn retire(&mut self, commitment: &Commitment, at: DateTime<Utc>) -> Result<()> {
        self.retired.insert(*commitment, at);
        Ok(())
    }

    fn append_event(&mut self, event: &BetEvent) -> Result<u64> {
        let seq = self.events.len() as u64 + 1;
        self.events.push(SequencedEvent {
            seq,
            event: event.clone(),
        });
        Ok(seq)
    }

    fn events_since(&self, after: u64) -> Result<Vec<SequencedEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.seq > after)
            .cloned()
            .collect())
    }

    fn live_commitments(&self) -> Result<Vec<Commitment>> {
        let mut commitments: Vec<Commitment> = self.proposed.keys().copied().collect();
        commitments.sort();
        Ok(commitments)
    }
}
