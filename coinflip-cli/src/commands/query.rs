use super::{parse_commitment, Context};
use anyhow::Result;
use chrono::{DateTime, Utc};
use coinflip_ledger::{
    BetEventKind, BetState, BetStore, CounterCommitment, SettlementOutcome, SqliteBetStore,
};
use comfy_table::{presets::UTF8_FULL, Table};

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub async fn show_status(ctx: &Context, commitment: &str) -> Result<()> {
    let commitment = parse_commitment(commitment)?;

    // The connection guard must be gone before the vault is awaited
    let (state, deadlines) = {
        let conn = ctx.storage.get_connection();
        let store = SqliteBetStore::new(&conn);
        let state = ctx.ledger.state(&store, &commitment)?;
        let deadlines = match &state {
            BetState::Accepted(proposed, accepted) => {
                [&proposed.proposer, &accepted.acceptor].map(|account| {
                    match ctx.ledger.forfeit_deadline(&store, &commitment, account) {
                        Ok(deadline) => timestamp(&deadline),
                        Err(e) => format!("- ({})", e),
                    }
                })
            }
            _ => Default::default(),
        };
        (state, deadlines)
    };

    println!("Bet {}", commitment);
    println!("State: {}", state.label());

    match state {
        BetState::Empty => {
            println!("No bet has been proposed under this commitment.");
        }
        BetState::Settled => {
            println!("This bet has been settled; see `coinflip events` for the outcome.");
        }
        BetState::Proposed(proposed) => {
            println!("Proposer: {}", proposed.proposer);
            println!("Stake: {} sats", proposed.stake.to_sat());
            println!("Proposed at: {}", timestamp(&proposed.proposed_at));
            println!("Waiting for an acceptor.");
        }
        BetState::Accepted(proposed, accepted) => {
            println!("Proposer: {}", proposed.proposer);
            println!("Acceptor: {}", accepted.acceptor);
            println!("Stake: {} sats each", proposed.stake.to_sat());
            println!("Accepted at: {}", timestamp(&accepted.accepted_at));

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "Side",
                "Account",
                "Revealed",
                "Secret in vault",
                "Forfeit claimable after",
            ]);

            let parties = [
                (
                    "Proposer",
                    &proposed.proposer,
                    accepted.proposer_reveal.map(|r| timestamp(&r.revealed_at)),
                ),
                (
                    "Acceptor",
                    &accepted.acceptor,
                    match accepted.counter_commitment {
                        CounterCommitment::Secret(_) => Some("at accept".to_string()),
                        CounterCommitment::Sealed(_) => {
                            accepted.acceptor_reveal.map(|r| timestamp(&r.revealed_at))
                        }
                    },
                ),
            ];
            for ((side, account, revealed), deadline) in parties.into_iter().zip(deadlines) {
                let in_vault = ctx.vault.contains(&commitment, account).await?;
                table.add_row(vec![
                    side.to_string(),
                    account.to_string(),
                    revealed.unwrap_or_else(|| "no".to_string()),
                    if in_vault { "yes" } else { "no" }.to_string(),
                    deadline,
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

pub async fn list_bets(ctx: &Context) -> Result<()> {
    let conn = ctx.storage.get_connection();
    let store = SqliteBetStore::new(&conn);
    let commitments = store.live_commitments()?;

    if commitments.is_empty() {
        println!("No open bets.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Commitment",
        "State",
        "Proposer",
        "Acceptor",
        "Stake (sats)",
        "Proposed",
    ]);

    for commitment in commitments {
        let (proposed, acceptor) = match ctx.ledger.state(&store, &commitment)? {
            BetState::Proposed(proposed) => (proposed, "-".to_string()),
            BetState::Accepted(proposed, accepted) => (proposed, accepted.acceptor.to_string()),
            _ => continue,
        };
        table.add_row(vec![
            commitment.to_hex(),
            if proposed.accepted { "Accepted" } else { "Proposed" }.to_string(),
            proposed.proposer.to_string(),
            acceptor,
            proposed.stake.to_sat().to_string(),
            timestamp(&proposed.proposed_at),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn show_events(ctx: &Context, since: u64) -> Result<()> {
    let conn = ctx.storage.get_connection();
    let store = SqliteBetStore::new(&conn);
    let events = ctx.ledger.events_since(&store, since)?;

    if events.is_empty() {
        println!("No events after #{}.", since);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Time", "Event", "Commitment", "Details"]);

    for sequenced in &events {
        let kind = &sequenced.event.kind;
        let details = match kind {
            BetEventKind::Proposed {
                proposer, stake, ..
            } => format!("{} stakes {} sats", proposer, stake.to_sat()),
            BetEventKind::Accepted {
                proposer, acceptor, ..
            } => format!("{} vs {}", proposer, acceptor),
            BetEventKind::SecretRevealed { side, .. } => format!("{} revealed", side),
            BetEventKind::Settled {
                winner,
                payout,
                outcome,
                ..
            } => match outcome {
                SettlementOutcome::Revealed { agreed_random } => format!(
                    "{} wins {} sats (random {})",
                    winner,
                    payout.to_sat(),
                    agreed_random.to_hex()
                ),
                SettlementOutcome::Forfeited => {
                    format!("{} wins {} sats by forfeit", winner, payout.to_sat())
                }
            },
        };

        table.add_row(vec![
            sequenced.seq.to_string(),
            timestamp(&sequenced.event.recorded_at),
            kind.name().to_string(),
            kind.commitment().short(),
            details,
        ]);
    }

    println!("{}", table);
    if let Some(last) = events.last() {
        println!("Poll for newer events with: coinflip events --since {}", last.seq);
    }
    Ok(())
}

pub async fn show_config(ctx: &Context) -> Result<()> {
    println!("Data directory: {}", ctx.data_dir.display());
    println!("Database: {}", ctx.config.db_path(&ctx.data_dir).display());
    println!("Vault: {}", ctx.config.vault_path(&ctx.data_dir).display());
    println!();
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::parse_account;
    use super::*;
    use chrono::Utc;
    use coinflip_core::{AccountStore, Amount};
    use coinflip_ledger::{RevealScheme, Secret};
    use std::future::{poll_fn, Future};
    use std::path::Path;
    use std::pin::pin;
    use std::sync::mpsc;
    use std::task::Poll;
    use std::time::Duration;
    use tempfile::tempdir;

    /// A context holding one accepted two-sided bet, with the proposer's
    /// secret sealed.
    async fn open_with_accepted_bet(data_dir: &Path) -> (Context, String) {
        let ctx = Context::open(data_dir.to_path_buf(), Some("pw".to_string()))
            .await
            .unwrap();
        let alice = parse_account("alice").unwrap();
        let bob = parse_account("bob").unwrap();
        {
            let conn = ctx.storage.get_connection();
            let accounts = AccountStore::new(&conn);
            for who in [&alice, &bob] {
                accounts.create_account(who, Utc::now()).unwrap();
                accounts.deposit(who, Amount::from_sat(50)).unwrap();
            }
        }

        let a = Secret::from_u128(7);
        let commitment = a.commit();
        ctx.vault.store(&commitment, &alice, &a, "pw").await.unwrap();
        ctx.transact(|ledger, store, platform| {
            ledger.propose(store, platform, &alice, commitment, Amount::from_sat(5))?;
            ledger.accept(
                store,
                platform,
                &bob,
                commitment,
                RevealScheme::TwoSided.counter_value(&Secret::from_u128(8)),
                Amount::from_sat(5),
            )
        })
        .unwrap();

        (ctx, commitment.to_hex())
    }

    #[tokio::test]
    async fn test_queries_over_an_accepted_bet() {
        let dir = tempdir().unwrap();
        let (ctx, hex) = open_with_accepted_bet(dir.path()).await;

        show_status(&ctx, &hex).await.unwrap();
        list_bets(&ctx).await.unwrap();
        show_events(&ctx, 0).await.unwrap();
        assert!(show_status(&ctx, "zz").await.is_err());
    }

    #[test]
    fn test_status_releases_storage_while_reading_the_vault() {
        let (done, finished) = mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let dir = tempdir().unwrap();
                let (ctx, hex) = open_with_accepted_bet(dir.path()).await;

                let mut status = pin!(show_status(&ctx, &hex));
                match poll_fn(|cx| Poll::Ready(status.as_mut().poll(cx))).await {
                    Poll::Ready(result) => result.unwrap(),
                    Poll::Pending => {
                        // Parked on the vault; the connection must be free
                        drop(ctx.storage.get_connection());
                        status.await.unwrap();
                    }
                }
            });
            done.send(()).unwrap();
        });

        finished
            .recv_timeout(Duration::from_secs(30))
            .expect("status kept the storage locked across the vault read");
    }
}
