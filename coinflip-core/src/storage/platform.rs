use crate::error::{CoinflipError, Result};
use crate::platform::Platform;
use crate::storage::account_store::{checked_credit, AccountStore};
use crate::types::AccountId;
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// Platform backed by the `accounts` and `escrow` tables.
///
/// Built per transaction: `now` is fixed when the transaction starts, so
/// every check inside one operation sees the same timestamp.
pub struct SqlitePlatform<'a> {
    accounts: AccountStore<'a>,
    now: DateTime<Utc>,
}

impl<'a> SqlitePlatform<'a> {
    pub fn new(conn: &'a Connection, now: DateTime<Utc>) -> Self {
        Self {
            accounts: AccountStore::new(conn),
            now,
        }
    }

    pub fn accounts(&self) -> &AccountStore<'a> {
        &self.accounts
    }
}

impl Platform for SqlitePlatform<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn collect(&mut self, from: &AccountId, amount: Amount) -> Result<()> {
        let balance = self.accounts.balance(from)?;
        let remaining = balance
            .checked_sub(amount)
            .ok_or(CoinflipError::InsufficientFunds {
                need: amount.to_sat(),
                available: balance.to_sat(),
            })?;
        let escrow = checked_credit(self.accounts.escrow()?, amount)?;

        self.accounts.set_balance(from, remaining)?;
        self.accounts.set_escrow(escrow)?;
        tracing::debug!("Collected {} sats from {}", amount.to_sat(), from);
        Ok(())
    }

    fn pay(&mut self, to: &AccountId, amount: Amount) -> Result<()> {
        let held = self.accounts.escrow()?;
        let escrow = held.checked_sub(amount).ok_or(CoinflipError::EscrowShortfall {
            need: amount.to_sat(),
            held: held.to_sat(),
        })?;
        let balance = checked_credit(self.accounts.balance(to)?, amount)?;

        self.accounts.set_escrow(escrow)?;
        self.accounts.set_balance(to, balance)?;
        tracing::debug!("Paid {} sats to {}", amount.to_sat(), to);
        Ok(())
    }

    fn escrowed(&self) -> Result<Amount> {
        self.accounts.escrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn test_sqlite_platform_moves_funds_through_escrow() {
        let storage = Storage::in_memory().unwrap();
        let alice = AccountId::new("alice").unwrap();
        let bob = AccountId::new("bob").unwrap();

        storage
            .transaction(|tx| {
                let mut platform = SqlitePlatform::new(tx, Utc::now());
                platform.accounts().create_account(&alice, Utc::now())?;
                platform.accounts().create_account(&bob, Utc::now())?;
                platform.accounts().deposit(&alice, Amount::from_sat(500))?;

                platform.collect(&alice, Amount::from_sat(200))?;
                platform.pay(&bob, Amount::from_sat(150))?;
                Ok::<_, CoinflipError>(())
            })
            .unwrap();

        let conn = storage.get_connection();
        let accounts = AccountStore::new(&conn);
        assert_eq!(accounts.balance(&alice).unwrap(), Amount::from_sat(300));
        assert_eq!(accounts.balance(&bob).unwrap(), Amount::from_sat(150));
        assert_eq!(accounts.escrow().unwrap(), Amount::from_sat(50));
    }

    #[test]
    fn test_sqlite_platform_rejects_overdraft() {
        let storage = Storage::in_memory().unwrap();
        let alice = AccountId::new("alice").unwrap();

        let err = storage
            .transaction(|tx| {
                let mut platform = SqlitePlatform::new(tx, Utc::now());
                platform.accounts().create_account(&alice, Utc::now())?;
                platform.collect(&alice, Amount::from_sat(1))
            })
            .unwrap_err();

        assert!(matches!(
            err,
            CoinflipError::InsufficientFunds { need: 1, available: 0 }
        ));
    }
}
