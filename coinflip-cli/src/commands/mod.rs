pub mod account;
pub mod bet;
pub mod query;

pub use account::{handle_account_command, AccountCommands};
pub use bet::{accept_bet, forfeit_bet, propose_bet, reveal_bet};
pub use query::{list_bets, show_config, show_events, show_status};

use crate::config::CliConfig;
use crate::vault::Vault;
use anyhow::{Context as _, Result};
use chrono::{SubsecRound, Utc};
use coinflip_core::{AccountId, SqlitePlatform, Storage};
use coinflip_ledger::{store::sqlite, BetLedger, Commitment, SqliteBetStore};
use dialoguer::Password;
use std::path::PathBuf;

/// Everything a command needs: the database, the ledger and the vault.
pub struct Context {
    pub data_dir: PathBuf,
    pub config: CliConfig,
    pub storage: Storage,
    pub ledger: BetLedger,
    pub vault: Vault,
    passphrase: Option<String>,
}

impl Context {
    pub async fn open(data_dir: PathBuf, passphrase: Option<String>) -> Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating {}", data_dir.display()))?;

        let config = CliConfig::load_or_init(&data_dir).await?;
        let storage = Storage::open(&config.db_path(&data_dir))?;
        sqlite::init_schema(&storage.get_connection())?;
        let ledger = BetLedger::new(config.ledger.clone())?;
        let vault = Vault::new(config.vault_path(&data_dir));

        Ok(Self {
            data_dir,
            config,
            storage,
            ledger,
            vault,
            passphrase,
        })
    }

    /// The vault passphrase from `--passphrase`/`COINFLIP_PASSPHRASE`, or
    /// an interactive prompt.
    pub fn passphrase(&self) -> Result<String> {
        if let Some(passphrase) = &self.passphrase {
            return Ok(passphrase.clone());
        }

        Password::new()
            .with_prompt("Vault passphrase")
            .interact()
            .context("reading passphrase")
    }

    /// Run one ledger operation in its own sqlite transaction.
    ///
    /// The whole operation sees a single timestamp, cut to the millisecond
    /// precision the bet tables store, and commits only if it succeeds.
    pub fn transact<T, F>(&self, op: F) -> coinflip_ledger::Result<T>
    where
        F: FnOnce(&BetLedger, &mut SqliteBetStore<'_>, &mut SqlitePlatform<'_>) -> coinflip_ledger::Result<T>,
    {
        let now = Utc::now().trunc_subsecs(3);
        self.storage.transaction(|tx| {
            let mut store = SqliteBetStore::new(tx);
            let mut platform = SqlitePlatform::new(tx, now);
            op(&self.ledger, &mut store, &mut platform)
        })
    }
}

pub(crate) fn parse_account(name: &str) -> Result<AccountId> {
    Ok(AccountId::new(name)?)
}

pub(crate) fn parse_commitment(hex: &str) -> Result<Commitment> {
    hex.parse()
        .with_context(|| format!("Invalid commitment '{}'", hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinflip_core::{AccountStore, Amount};
    use coinflip_ledger::{BetError, BetState, RevealOutcome, RevealScheme, Secret};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_context_runs_a_bet_end_to_end() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(dir.path().join("data"), Some("pw".to_string()))
            .await
            .unwrap();
        assert_eq!(ctx.passphrase().unwrap(), "pw");

        let alice = parse_account("alice").unwrap();
        let bob = parse_account("bob").unwrap();
        {
            let conn = ctx.storage.get_connection();
            let accounts = AccountStore::new(&conn);
            for who in [&alice, &bob] {
                accounts.create_account(who, Utc::now()).unwrap();
                accounts.deposit(who, Amount::from_sat(100)).unwrap();
            }
        }

        let a = Secret::from_u128(0xAAAA);
        let b = Secret::from_u128(0xBBBB);
        let commitment = a.commit();
        ctx.transact(|ledger, store, platform| {
            ledger.propose(store, platform, &alice, commitment, Amount::from_sat(40))?;
            ledger.accept(
                store,
                platform,
                &bob,
                commitment,
                RevealScheme::TwoSided.counter_value(&b),
                Amount::from_sat(40),
            )
        })
        .unwrap();

        let err = ctx
            .transact(|ledger, store, platform| ledger.reveal(store, platform, &bob, a))
            .unwrap_err();
        assert!(matches!(err, BetError::NotYourBet));

        ctx.transact(|ledger, store, platform| {
            ledger.reveal_secret(store, platform, &bob, commitment, b)
        })
        .unwrap();
        let outcome = ctx
            .transact(|ledger, store, platform| ledger.reveal(store, platform, &alice, a))
            .unwrap();
        assert!(matches!(outcome, RevealOutcome::Settled(ref s) if s.winner == bob));

        let conn = ctx.storage.get_connection();
        let store = SqliteBetStore::new(&conn);
        assert_eq!(ctx.ledger.state(&store, &commitment).unwrap(), BetState::Settled);
        assert_eq!(
            AccountStore::new(&conn).balance(&bob).unwrap(),
            Amount::from_sat(140)
        );
    }

    #[tokio::test]
    async fn test_stored_timestamps_match_the_operation_clock() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(dir.path().to_path_buf(), None).await.unwrap();
        let alice = parse_account("alice").unwrap();
        {
            let conn = ctx.storage.get_connection();
            let accounts = AccountStore::new(&conn);
            accounts.create_account(&alice, Utc::now()).unwrap();
            accounts.deposit(&alice, Amount::from_sat(10)).unwrap();
        }

        let commitment = Secret::from_u128(5).commit();
        let proposed = ctx
            .transact(|ledger, store, platform| {
                ledger.propose(store, platform, &alice, commitment, Amount::from_sat(3))
            })
            .unwrap();

        let conn = ctx.storage.get_connection();
        let store = SqliteBetStore::new(&conn);
        match ctx.ledger.state(&store, &commitment).unwrap() {
            BetState::Proposed(stored) => assert_eq!(stored, proposed),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_parse_commitment_accepts_prefixed_hex() {
        let commitment = Secret::from_u128(1).commit();
        let prefixed = format!("0x{}", commitment.to_hex());

        assert_eq!(parse_commitment(&prefixed).unwrap(), commitment);
        assert!(parse_commitment("zz").is_err());
        assert!(parse_commitment(&format!("0x{}", prefixed)).is_err());
        assert!(parse_account(" ").is_err());
    }
}
