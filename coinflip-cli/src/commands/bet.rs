use super::{parse_account, parse_commitment, Context};
use anyhow::{Context as _, Result};
use coinflip_core::{AccountId, Amount};
use coinflip_ledger::{
    generate_secret, BetState, RevealOutcome, RevealScheme, Secret, Settlement,
    SettlementOutcome,
};

fn parse_secret(hex: Option<&str>) -> Result<Secret> {
    match hex {
        Some(hex) => Secret::from_hex(hex).with_context(|| format!("Invalid secret '{}'", hex)),
        None => Ok(generate_secret()),
    }
}

pub async fn propose_bet(
    ctx: &Context,
    account: &str,
    stake: u64,
    secret: Option<&str>,
) -> Result<()> {
    let account = parse_account(account)?;
    let secret = parse_secret(secret)?;
    let commitment = secret.commit();
    let passphrase = ctx.passphrase()?;

    // Seal first so an accepted bet can always be revealed. The vault refuses
    // to replace an entry, so a retry fails here and leaves it intact.
    ctx.vault
        .store(&commitment, &account, &secret, &passphrase)
        .await?;

    let result = ctx.transact(|ledger, store, platform| {
        ledger.propose(store, platform, &account, commitment, Amount::from_sat(stake))
    });
    if let Err(e) = result {
        // Only the entry sealed above
        ctx.vault.remove(&commitment, &account).await?;
        return Err(e.into());
    }

    println!("Bet proposed!");
    println!("Commitment: {}", commitment);
    println!("Stake: {} sats", stake);
    println!("Your secret is sealed in the vault.");
    println!();
    println!("Share this command with your counterparty:");
    println!("coinflip accept <their-account> {}", commitment);

    Ok(())
}

pub async fn accept_bet(
    ctx: &Context,
    account: &str,
    commitment: &str,
    stake: Option<u64>,
    secret: Option<&str>,
) -> Result<()> {
    let account = parse_account(account)?;
    let commitment = parse_commitment(commitment)?;
    let scheme = ctx.ledger.config().scheme;

    let stake = match stake {
        Some(sats) => Amount::from_sat(sats),
        None => {
            let conn = ctx.storage.get_connection();
            let store = coinflip_ledger::SqliteBetStore::new(&conn);
            match ctx.ledger.state(&store, &commitment)? {
                BetState::Proposed(bet) => bet.stake,
                // Let the ledger report why
                _ => Amount::ZERO,
            }
        }
    };

    let secret = parse_secret(secret)?;
    let counter_value = scheme.counter_value(&secret);

    // Basic bets carry the secret in the clear; only sealed ones need the vault
    let sealed = scheme == RevealScheme::TwoSided;
    if sealed {
        let passphrase = ctx.passphrase()?;
        ctx.vault
            .store(&commitment, &account, &secret, &passphrase)
            .await?;
    }

    let result = ctx.transact(|ledger, store, platform| {
        ledger.accept(store, platform, &account, commitment, counter_value, stake)
    });
    if let Err(e) = result {
        if sealed {
            ctx.vault.remove(&commitment, &account).await?;
        }
        return Err(e.into());
    }

    println!("Bet {} accepted!", commitment.short());
    println!("Stake: {} sats", stake.to_sat());
    match scheme {
        RevealScheme::Basic => {
            println!("Waiting for the proposer to reveal.");
        }
        RevealScheme::TwoSided => {
            println!("Your secret is sealed in the vault. Reveal it with:");
            println!("coinflip reveal {} {}", account, commitment);
        }
    }

    Ok(())
}

pub async fn reveal_bet(ctx: &Context, account: &str, commitment: &str) -> Result<()> {
    let account = parse_account(account)?;
    let commitment = parse_commitment(commitment)?;
    let passphrase = ctx.passphrase()?;
    let secret = ctx.vault.open(&commitment, &account, &passphrase).await?;

    let is_proposer = {
        let conn = ctx.storage.get_connection();
        let store = coinflip_ledger::SqliteBetStore::new(&conn);
        match ctx.ledger.state(&store, &commitment)? {
            BetState::Proposed(bet) | BetState::Accepted(bet, _) => bet.proposer == account,
            _ => false,
        }
    };

    let outcome = ctx.transact(|ledger, store, platform| {
        if is_proposer {
            ledger.reveal(store, platform, &account, secret)
        } else {
            ledger.reveal_secret(store, platform, &account, commitment, secret)
        }
    })?;

    match outcome {
        RevealOutcome::Pending { side } => {
            println!("Secret revealed as {}.", side);
            println!("Waiting for the counterparty to reveal.");
        }
        RevealOutcome::Settled(settlement) => {
            for party in [&settlement.winner, &settlement.loser] {
                ctx.vault.remove(&commitment, party).await?;
            }
            print_settlement(&settlement, &account);
        }
    }

    Ok(())
}

pub async fn forfeit_bet(ctx: &Context, account: &str, commitment: &str) -> Result<()> {
    let account = parse_account(account)?;
    let commitment = parse_commitment(commitment)?;

    let settlement = ctx.transact(|ledger, store, platform| {
        ledger.forfeit(store, platform, &account, commitment)
    })?;

    for party in [&settlement.winner, &settlement.loser] {
        ctx.vault.remove(&commitment, party).await?;
    }
    print_settlement(&settlement, &account);

    Ok(())
}

fn print_settlement(settlement: &Settlement, caller: &AccountId) {
    println!("Bet {} settled!", settlement.commitment.short());
    match settlement.outcome {
        SettlementOutcome::Revealed { agreed_random } => {
            println!("Agreed random: {}", agreed_random.to_hex());
        }
        SettlementOutcome::Forfeited => {
            println!("{} failed to reveal in time.", settlement.loser);
        }
    }
    println!(
        "Winner: {} ({}), {} sats",
        settlement.winner,
        settlement.winning_side,
        settlement.payout.to_sat()
    );

    if settlement.winner == *caller {
        println!("You won!");
    } else if settlement.loser == *caller {
        println!("You lost.");
    }
}
