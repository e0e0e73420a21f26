use crate::error::{CoinflipError, Result};
use crate::types::{AccountId, AccountInfo};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct AccountStore<'a> {
    conn: &'a Connection,
}

impl<'a> AccountStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn create_account(&self, id: &AccountId, now: DateTime<Utc>) -> Result<()> {
        if self.account_exists(id)? {
            return Err(CoinflipError::AccountExists {
                name: id.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO accounts (id, balance, created_at) VALUES (?1, 0, ?2)",
            params![id.as_str(), now.timestamp_millis()],
        )?;

        tracing::info!("Created account {}", id);
        Ok(())
    }

    pub fn account_exists(&self, id: &AccountId) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    pub fn balance(&self, id: &AccountId) -> Result<Amount> {
        let sats: Option<i64> = self
            .conn
            .query_row(
                "SELECT balance FROM accounts WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        sats.map(sats_to_amount)
            .ok_or_else(|| CoinflipError::account_not_found(id.as_str()))
    }

    /// Credit an existing account from outside the ledger.
    pub fn deposit(&self, id: &AccountId, amount: Amount) -> Result<Amount> {
        let balance = self.balance(id)?;
        let updated = checked_credit(balance, amount)?;
        self.set_balance(id, updated)?;

        tracing::info!(
            "Deposited {} sats to {}, balance {} sats",
            amount.to_sat(),
            id,
            updated.to_sat()
        );
        Ok(updated)
    }

    pub fn list_accounts(&self) -> Result<Vec<AccountInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, balance, created_at FROM accounts ORDER BY created_at ASC")?;

        let account_iter = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let created_at: i64 = row.get(2)?;
            Ok((id, sats_to_amount(row.get(1)?), created_at))
        })?;

        let mut accounts = Vec::new();
        for account in account_iter {
            let (id, balance, created_at) = account?;
            accounts.push(AccountInfo {
                id: AccountId::new(id)?,
                balance,
                created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
            });
        }

        Ok(accounts)
    }

    pub(crate) fn set_balance(&self, id: &AccountId, balance: Amount) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE accounts SET balance = ?1 WHERE id = ?2",
            params![amount_to_sats(balance)?, id.as_str()],
        )?;

        if updated == 0 {
            return Err(CoinflipError::account_not_found(id.as_str()));
        }
        Ok(())
    }

    pub fn escrow(&self) -> Result<Amount> {
        let sats: i64 =
            self.conn
                .query_row("SELECT balance FROM escrow WHERE id = 0", [], |row| row.get(0))?;
        Ok(sats_to_amount(sats))
    }

    pub(crate) fn set_escrow(&self, balance: Amount) -> Result<()> {
        self.conn.execute(
            "UPDATE escrow SET balance = ?1 WHERE id = 0",
            params![amount_to_sats(balance)?],
        )?;
        Ok(())
    }
}

/// Add `amount` to `balance`, keeping the result within the money supply.
pub(crate) fn checked_credit(balance: Amount, amount: Amount) -> Result<Amount> {
    balance
        .checked_add(amount)
        .filter(|total| *total <= Amount::MAX_MONEY)
        .ok_or_else(|| {
            CoinflipError::overflow(format!(
                "{} sats + {} sats exceeds the money supply",
                balance.to_sat(),
                amount.to_sat()
            ))
        })
}

fn amount_to_sats(amount: Amount) -> Result<i64> {
    i64::try_from(amount.to_sat())
        .map_err(|_| CoinflipError::overflow(format!("{} sats", amount.to_sat())))
}

// CHECK constraints keep stored balances non-negative
fn sats_to_amount(sats: i64) -> Amount {
    Amount::from_sat(sats.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn test_account_lifecycle() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.get_connection();
        let accounts = AccountStore::new(&conn);
        let alice = AccountId::new("alice").unwrap();

        accounts.create_account(&alice, Utc::now()).unwrap();
        assert_eq!(accounts.balance(&alice).unwrap(), Amount::ZERO);

        let balance = accounts.deposit(&alice, Amount::from_sat(1_000)).unwrap();
        assert_eq!(balance, Amount::from_sat(1_000));

        let listed = accounts.list_accounts().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, alice);
        assert_eq!(listed[0].balance, Amount::from_sat(1_000));
    }

    #[test]
    fn test_duplicate_account_is_rejected() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.get_connection();
        let accounts = AccountStore::new(&conn);
        let alice = AccountId::new("alice").unwrap();

        accounts.create_account(&alice, Utc::now()).unwrap();
        let err = accounts.create_account(&alice, Utc::now()).unwrap_err();
        assert!(matches!(err, CoinflipError::AccountExists { .. }));
    }

    #[test]
    fn test_deposit_beyond_money_supply_fails() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.get_connection();
        let accounts = AccountStore::new(&conn);
        let alice = AccountId::new("alice").unwrap();
        accounts.create_account(&alice, Utc::now()).unwrap();

        accounts.deposit(&alice, Amount::MAX_MONEY).unwrap();
        let err = accounts.deposit(&alice, Amount::from_sat(1)).unwrap_err();
        assert!(matches!(err, CoinflipError::AmountOverflow(_)));
        assert_eq!(accounts.balance(&alice).unwrap(), Amount::MAX_MONEY);
    }

    #[test]
    fn test_balance_of_unknown_account() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.get_connection();
        let err = AccountStore::new(&conn)
            .balance(&AccountId::new("nobody").unwrap())
            .unwrap_err();
        assert!(matches!(err, CoinflipError::AccountNotFound { .. }));
    }
}
