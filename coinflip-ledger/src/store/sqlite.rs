use crate::bet::{AcceptedBet, CounterCommitment, ProposedBet, RevealedSecret};
use crate::commitment::Commitment;
use crate::error::{BetError, Result};
use crate::event::{BetEvent, BetEventKind, SequencedEvent};
use crate::store::BetStore;
use chrono::{DateTime, Utc};
use coinflip_core::{AccountId, Amount};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Create the ledger tables next to the platform's account tables.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS proposed_bets (
            commitment TEXT PRIMARY KEY,
            proposer TEXT NOT NULL,
            stake INTEGER NOT NULL,
            proposed_at INTEGER NOT NULL,
            accepted INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accepted_bets (
            commitment TEXT PRIMARY KEY,
            acceptor TEXT NOT NULL,
            accepted_at INTEGER NOT NULL,
            counter_commitment TEXT NOT NULL,
            proposer_reveal TEXT,
            acceptor_reveal TEXT,
            FOREIGN KEY (commitment) REFERENCES proposed_bets(commitment)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS retired_commitments (
            commitment TEXT PRIMARY KEY,
            retired_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bet_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL,
            recorded_at INTEGER NOT NULL,
            payload TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Bet tables on a sqlite connection, usually an open transaction.
pub struct SqliteBetStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBetStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl BetStore for SqliteBetStore<'_> {
    fn proposed(&self, commitment: &Commitment) -> Result<Option<ProposedBet>> {
        let row = self
            .conn
            .query_row(
                "SELECT proposer, stake, proposed_at, accepted
                 FROM proposed_bets WHERE commitment = ?1",
                params![commitment.to_hex()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(proposer, stake, proposed_at, accepted)| -> Result<ProposedBet> {
            Ok(ProposedBet {
                proposer: AccountId::new(proposer)?,
                stake: sats_to_amount(stake)?,
                proposed_at: millis_to_time(proposed_at)?,
                accepted,
            })
        })
        .transpose()
    }

    fn accepted(&self, commitment: &Commitment) -> Result<Option<AcceptedBet>> {
        let row = self
            .conn
            .query_row(
                "SELECT acceptor, accepted_at, counter_commitment, proposer_reveal, acceptor_reveal
                 FROM accepted_bets WHERE commitment = ?1",
                params![commitment.to_hex()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(
            |(acceptor, accepted_at, counter_json, proposer_json, acceptor_json)| -> Result<AcceptedBet> {
                let counter_commitment: CounterCommitment = serde_json::from_str(&counter_json)?;
                Ok(AcceptedBet {
                    acceptor: AccountId::new(acceptor)?,
                    accepted_at: millis_to_time(accepted_at)?,
                    counter_commitment,
                    proposer_reveal: parse_reveal(proposer_json)?,
                    acceptor_reveal: parse_reveal(acceptor_json)?,
                })
            },
        )
        .transpose()
    }

    fn put_proposed(&mut self, commitment: &Commitment, bet: &ProposedBet) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO proposed_bets
             (commitment, proposer, stake, proposed_at, accepted)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                commitment.to_hex(),
                bet.proposer.as_str(),
                amount_to_sats(bet.stake)?,
                bet.proposed_at.timestamp_millis(),
                bet.accepted,
            ],
        )?;
        Ok(())
    }

    fn put_accepted(&mut self, commitment: &Commitment, bet: &AcceptedBet) -> Result<()> {
        let proposer_reveal = bet.proposer_reveal.map(|r| serde_json::to_string(&r)).transpose()?;
        let acceptor_reveal = bet.acceptor_reveal.map(|r| serde_json::to_string(&r)).transpose()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO accepted_bets
             (commitment, acceptor, accepted_at, counter_commitment, proposer_reveal, acceptor_reveal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                commitment.to_hex(),
                bet.acceptor.as_str(),
                bet.accepted_at.timestamp_millis(),
                serde_json::to_string(&bet.counter_commitment)?,
                proposer_reveal,
                acceptor_reveal,
            ],
        )?;
        Ok(())
    }

    fn remove(&mut self, commitment: &Commitment) -> Result<()> {
        // Delete in order due to foreign key constraints
        self.conn.execute(
            "DELETE FROM accepted_bets WHERE commitment = ?1",
            params![commitment.to_hex()],
        )?;
        self.conn.execute(
            "DELETE FROM proposed_bets WHERE commitment = ?1",
            params![commitment.to_hex()],
        )?;
        Ok(())
    }

    fn is_retired(&self, commitment: &Commitment) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM retired_commitments WHERE commitment = ?1",
            params![commitment.to_hex()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn retire(&mut self, commitment: &Commitment, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO retired_commitments (commitment, retired_at) VALUES (?1, ?2)",
            params![commitment.to_hex(), at.timestamp_millis()],
        )?;
        Ok(())
    }

    fn append_event(&mut self, event: &BetEvent) -> Result<u64> {
        self.conn.execute(
            "INSERT INTO bet_events (id, recorded_at, payload) VALUES (?1, ?2, ?3)",
            params![
                event.id.to_string(),
                event.recorded_at.timestamp_millis(),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid() as u64)
    }

    fn events_since(&self, after: u64) -> Result<Vec<SequencedEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, id, recorded_at, payload FROM bet_events
             WHERE seq > ?1 ORDER BY seq ASC",
        )?;

        let after = i64::try_from(after).unwrap_or(i64::MAX);
        let event_iter = stmt.query_map(params![after], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in event_iter {
            let (seq, id, recorded_at, payload) = row?;
            let kind: BetEventKind = serde_json::from_str(&payload)?;
            events.push(SequencedEvent {
                seq: seq as u64,
                event: BetEvent {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| BetError::corrupt(format!("event id {}: {}", id, e)))?,
                    recorded_at: millis_to_time(recorded_at)?,
                    kind,
                },
            });
        }

        Ok(events)
    }

    fn live_commitments(&self) -> Result<Vec<Commitment>> {
        let mut stmt = self
            .conn
            .prepare("SELECT commitment FROM proposed_bets ORDER BY proposed_at ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut commitments = Vec::new();
        for row in rows {
            let hex = row?;
            commitments.push(
                hex.parse()
                    .map_err(|e| BetError::corrupt(format!("commitment {}: {}", hex, e)))?,
            );
        }
        Ok(commitments)
    }
}

fn parse_reveal(json: Option<String>) -> Result<Option<RevealedSecret>> {
    Ok(json.map(|s| serde_json::from_str(&s)).transpose()?)
}

fn millis_to_time(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| BetError::corrupt(format!("timestamp {} out of range", millis)))
}

fn amount_to_sats(amount: Amount) -> Result<i64> {
    i64::try_from(amount.to_sat())
        .map_err(|_| BetError::overflow(format!("{} sats does not fit storage", amount.to_sat())))
}

fn sats_to_amount(sats: i64) -> Result<Amount> {
    u64::try_from(sats)
        .map(Amount::from_sat)
        .map_err(|_| BetError::corrupt(format!("negative stake {}", sats)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Secret;
    use coinflip_core::Storage;

    fn setup() -> Storage {
        let storage = Storage::in_memory().unwrap();
        init_schema(&storage.get_connection()).unwrap();
        storage
    }

    #[test]
    fn test_bet_records_survive_a_round_trip() {
        let storage = setup();
        let conn = storage.get_connection();
        let mut store = SqliteBetStore::new(&conn);
        let commitment = Secret::from_u128(1).commit();
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let proposed = ProposedBet {
            proposer: AccountId::new("alice").unwrap(),
            stake: Amount::from_sat(10),
            proposed_at: now,
            accepted: true,
        };
        let accepted = AcceptedBet {
            acceptor: AccountId::new("bob").unwrap(),
            accepted_at: now,
            counter_commitment: CounterCommitment::Sealed(Secret::from_u128(2).commit()),
            proposer_reveal: Some(RevealedSecret {
                secret: Secret::from_u128(1),
                revealed_at: now,
            }),
            acceptor_reveal: None,
        };

        store.put_proposed(&commitment, &proposed).unwrap();
        store.put_accepted(&commitment, &accepted).unwrap();

        assert_eq!(store.proposed(&commitment).unwrap(), Some(proposed));
        assert_eq!(store.accepted(&commitment).unwrap(), Some(accepted));
        assert_eq!(store.live_commitments().unwrap(), vec![commitment]);

        store.remove(&commitment).unwrap();
        assert_eq!(store.proposed(&commitment).unwrap(), None);
        assert_eq!(store.accepted(&commitment).unwrap(), None);
    }

    #[test]
    fn test_event_log_is_sequenced() {
        let storage = setup();
        let conn = storage.get_connection();
        let mut store = SqliteBetStore::new(&conn);
        let commitment = Secret::from_u128(9).commit();
        let now = Utc::now();

        let first = store
            .append_event(&BetEvent::new(
                BetEventKind::Proposed {
                    commitment,
                    proposer: AccountId::new("alice").unwrap(),
                    stake: Amount::from_sat(5),
                },
                now,
            ))
            .unwrap();
        let second = store
            .append_event(&BetEvent::new(
                BetEventKind::SecretRevealed {
                    commitment,
                    side: crate::commitment::Side::Proposer,
                },
                now,
            ))
            .unwrap();
        assert!(second > first);

        let all = store.events_since(0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event.kind.name(), "bet proposed");

        let tail = store.events_since(first).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].seq, second);
    }

    #[test]
    fn test_retired_commitments() {
        let storage = setup();
        let conn = storage.get_connection();
        let mut store = SqliteBetStore::new(&conn);
        let commitment = Secret::from_u128(3).commit();

        assert!(!store.is_retired(&commitment).unwrap());
        store.retire(&commitment, Utc::now()).unwrap();
        store.retire(&commitment, Utc::now()).unwrap();
        assert!(store.is_retired(&commitment).unwrap());
    }
}
